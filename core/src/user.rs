//! PPMS user accounts.

use std::fmt;

use tracing::trace;

use crate::codec::{decode_single, Record};
use crate::error::{PpmsError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PpmsUser {
    pub username: String,
    pub email: String,
    pub ppms_group: String,
    pub active: bool,
    lname: String,
    fname: String,
}

impl PpmsUser {
    pub fn new(username: &str, email: &str, fullname_parts: (&str, &str), ppms_group: &str) -> Self {
        Self {
            username: username.to_string(),
            email: email.to_string(),
            ppms_group: ppms_group.to_string(),
            active: true,
            lname: fullname_parts.0.to_string(),
            fname: fullname_parts.1.to_string(),
        }
    }

    /// Build a user from the text of a `getuser` response.
    pub fn from_response(text: &str) -> Result<Self> {
        let details = decode_single(text, true)?;
        Self::from_record(&details)
    }

    pub fn from_record(details: &Record) -> Result<Self> {
        let field = |key: &str| -> Result<String> {
            details
                .get(key)
                .map(ToString::to_string)
                .ok_or_else(|| PpmsError::invalid("user", format!("missing field `{key}`")))
        };
        if !details.contains_key("active") {
            return Err(PpmsError::invalid("user", "missing field `active`"));
        }

        let user = Self {
            username: field("login")?,
            email: field("email")?,
            ppms_group: field("unitlogin")?,
            active: details.get_bool("active") == Some(true),
            lname: field("lname")?,
            fname: field("fname")?,
        };
        trace!(
            username = %user.username,
            email = %user.email,
            ppms_group = %user.ppms_group,
            fullname = %user.fullname(),
            active = user.active,
            "PpmsUser initialized"
        );
        Ok(user)
    }

    /// `"<LASTNAME> <FIRSTNAME>"`, or the username when both are empty.
    pub fn fullname(&self) -> String {
        if self.lname.is_empty() && self.fname.is_empty() {
            return self.username.clone();
        }
        format!("{} {}", self.lname, self.fname)
    }

    pub fn details(&self) -> String {
        format!(
            "username: {}, email: {}, fullname: {}, ppms_group: {}, active: {}",
            self.username,
            self.email,
            self.fullname(),
            self.ppms_group,
            if self.active { "True" } else { "False" }
        )
    }
}

impl fmt::Display for PpmsUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.username)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RESPONSE: &str = "login,lname,fname,email,phone,bcode,affiliation,\
        unitlogin,mustchpwd,mustchbcode,active\r\n\
        \"pumapy\",\"Python\",\"PumAPI\",\"pumapy@python-facility.example\",\"\",\"\",\"\",\
        \"pumapy_group\",false,false,true\r\n";

    #[test]
    fn from_response() {
        let user = PpmsUser::from_response(RESPONSE).unwrap();
        assert_eq!(user.username, "pumapy");
        assert_eq!(user.email, "pumapy@python-facility.example");
        assert_eq!(user.ppms_group, "pumapy_group");
        assert!(user.active);
        assert_eq!(user.fullname(), "Python PumAPI");
        assert_eq!(user.to_string(), "pumapy");
        assert_eq!(
            user.details(),
            "username: pumapy, email: pumapy@python-facility.example, \
             fullname: Python PumAPI, ppms_group: pumapy_group, active: True"
        );
    }

    #[test]
    fn fullname_falls_back_to_username() {
        let user = PpmsUser::new("ghost", "", ("", ""), "");
        assert_eq!(user.fullname(), "ghost");
    }

    #[test]
    fn inactive_user() {
        let text = "login,lname,fname,email,unitlogin,active\n\"bob\",\"B\",\"Bob\",\"b@x\",\"g\",false\n";
        let user = PpmsUser::from_response(text).unwrap();
        assert!(!user.active);
    }

    #[test]
    fn truncated_response_is_invalid() {
        let text = "login,lname,fname,email,unitlogin,active\n\"bob\",\"B\",\"Bob\"\n";
        let err = PpmsUser::from_response(text).unwrap_err();
        assert!(matches!(err, PpmsError::InvalidRecord { entity: "user", .. }));
    }
}
