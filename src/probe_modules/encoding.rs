//! Decoding of console output captured from external tools.
use lazy_static::lazy_static;

#[cfg(windows)]
use windows_sys::Win32::Globalization::GetACP;

lazy_static! {
    static ref CONSOLE_ENCODING: &'static encoding_rs::Encoding = {
        #[cfg(windows)]
        {
            // tracert writes in the active ANSI code page.
            let acp = unsafe { GetACP() };
            u16::try_from(acp)
                .ok()
                .and_then(codepage::to_encoding)
                .unwrap_or(encoding_rs::UTF_8)
        }
        #[cfg(not(windows))]
        {
            encoding_rs::UTF_8
        }
    };
}

/// Decodes tool output, trying UTF-8 first, then the console code page, then lossy UTF-8.
pub fn decode_output(bytes: &[u8]) -> String {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    if CONSOLE_ENCODING.name() != "UTF-8" {
        let (cow, _encoding_used, had_errors) = CONSOLE_ENCODING.decode(bytes);
        if !had_errors {
            return cow.into_owned();
        }
    }

    String::from_utf8_lossy(bytes).into_owned()
}
