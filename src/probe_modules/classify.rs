//! Maps measured speeds to the activities they comfortably support.
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadTier {
    UltraHdGaming,
    HdConferencing,
    SdBrowsing,
    Minimum,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadTier {
    LiveStreaming,
    Conferencing,
    Minimum,
}

impl DownloadTier {
    pub fn from_mbps(download_mbps: f64) -> Self {
        if download_mbps >= 25.0 {
            DownloadTier::UltraHdGaming
        } else if download_mbps >= 10.0 {
            DownloadTier::HdConferencing
        } else if download_mbps >= 5.0 {
            DownloadTier::SdBrowsing
        } else {
            DownloadTier::Minimum
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            DownloadTier::UltraHdGaming => {
                "Download speed suitable for 4K video streaming and online gaming."
            }
            DownloadTier::HdConferencing => {
                "Download speed suitable for HD video streaming and video conferencing."
            }
            DownloadTier::SdBrowsing => {
                "Download speed suitable for standard definition video and browsing social media."
            }
            DownloadTier::Minimum => "Download speed suitable for minimum use.",
        }
    }
}

impl UploadTier {
    pub fn from_mbps(upload_mbps: f64) -> Self {
        if upload_mbps >= 5.0 {
            UploadTier::LiveStreaming
        } else if upload_mbps >= 3.0 {
            UploadTier::Conferencing
        } else {
            UploadTier::Minimum
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            UploadTier::LiveStreaming => {
                "Upload speed suitable for live streaming and uploading large files."
            }
            UploadTier::Conferencing => {
                "Upload speed suitable for video conferencing and sharing content on social media."
            }
            UploadTier::Minimum => "Upload speed suitable for minimum use.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UseCaseGuidance {
    pub download: DownloadTier,
    pub upload: UploadTier,
}

pub fn classify(download_mbps: f64, upload_mbps: f64) -> UseCaseGuidance {
    UseCaseGuidance {
        download: DownloadTier::from_mbps(download_mbps),
        upload: UploadTier::from_mbps(upload_mbps),
    }
}

impl fmt::Display for UseCaseGuidance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.download.description())?;
        write!(f, "{}", self.upload.description())
    }
}
