use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SubsecRound, TimeZone, Utc};
use rand_core::OsRng;

use crate::errors::AppError;

const MIN_PASSWORD_LENGTH: usize = 8;

pub fn hash_password(password: &str) -> Result<String, AppError> {
    if password.len() < MIN_PASSWORD_LENGTH {
        return Err(AppError::validation(
            "password",
            format!("password must be at least {} characters", MIN_PASSWORD_LENGTH),
        ));
    }

    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|err| AppError::internal(format!("failed to hash password: {err}")))
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, AppError> {
    let parsed_hash = PasswordHash::new(password_hash)
        .map_err(|err| AppError::internal(format!("invalid password hash: {err}")))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

pub fn utc_now() -> DateTime<Utc> {
    Utc::now()
}

/// Shift boundaries are stored at whole-second precision so their text
/// encoding sorts chronologically.
pub fn to_whole_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.trunc_subsecs(0)
}

/// Accepts RFC3339, `YYYY-MM-DD HH:MM:SS[.f]` (taken as UTC) and `YYYY-MM-DD` (midnight UTC).
pub fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive));
    }

    // RFC3339 without seconds, e.g. 2025-06-01T09:00Z
    if let Some(stripped) = s.strip_suffix('Z') {
        if let Ok(naive) = NaiveDateTime::parse_from_str(stripped, "%Y-%m-%dT%H:%M") {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }

    parse_date(s)
}

pub fn parse_date(s: &str) -> Option<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()?;
    let midnight = date.and_hms_opt(0, 0, 0)?;
    Some(Utc.from_utc_datetime(&midnight))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn parses_supported_formats() {
        let rfc = parse_datetime("2025-06-01T09:00:00Z").expect("rfc3339");
        let sql = parse_datetime("2025-06-01 09:00:00").expect("sql");
        let short = parse_datetime("2025-06-01T09:00Z").expect("no seconds");
        assert_eq!(rfc, sql);
        assert_eq!(rfc, short);

        let date = parse_datetime("2025-06-01").expect("date only");
        assert_eq!(date.hour(), 0);
        assert!(parse_datetime("next tuesday").is_none());
    }

    #[test]
    fn short_passwords_are_rejected() {
        assert!(matches!(hash_password("short"), Err(AppError::Validation { .. })));
    }

    #[test]
    fn password_round_trip() {
        let hash = hash_password("correct horse").expect("hash");
        assert!(verify_password("correct horse", &hash).expect("verify"));
        assert!(!verify_password("wrong horse", &hash).expect("verify"));
    }
}
