//! Builds the `WIFI:` content string understood by QR scanning apps.
//!
//! Layout: `WIFI:S:<ssid>;T:<auth>;P:<password>;;`
//! - `S`: network name, trimmed of surrounding whitespace
//! - `T`: authentication type, `WPA` unless told otherwise
//! - `P`: password, embedded verbatim
//!
//! Reserved characters (`;`, `,`, `:`, `\`) are not escaped. A password
//! containing them produces a payload some scanners will misparse.

use std::fmt;
use std::str::FromStr;

/// Authentication type written into the `T:` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthType {
    #[default]
    Wpa,
    Wep,
    NoPass,
}

impl AuthType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthType::Wpa => "WPA",
            AuthType::Wep => "WEP",
            AuthType::NoPass => "nopass",
        }
    }
}

impl fmt::Display for AuthType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            s if s.eq_ignore_ascii_case("WPA") => Ok(AuthType::Wpa),
            s if s.eq_ignore_ascii_case("WEP") => Ok(AuthType::Wep),
            s if s.eq_ignore_ascii_case("nopass") => Ok(AuthType::NoPass),
            other => Err(crate::Error::InvalidConfig(format!(
                "unknown auth type '{}'",
                other
            ))),
        }
    }
}

/// Formats credentials with the default `WPA` auth type.
pub fn format(ssid: &str, password: &str) -> String {
    format_with_auth(ssid, password, AuthType::Wpa.as_str())
}

/// Formats credentials with an explicit auth type.
pub fn format_with_auth(ssid: &str, password: &str, auth: &str) -> String {
    format!("WIFI:S:{};T:{};P:{};;", ssid.trim(), auth, password)
}
