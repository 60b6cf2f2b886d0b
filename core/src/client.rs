//! Per-action convenience methods on top of `RequestGateway`.
//!
//! # Design
//! Each method is a thin wrapper: submit one action through the gateway,
//! decode the body with the codec (or the action's own line format) and
//! turn the result into entities. `PpmsClient` also remembers the users and
//! systems it has fetched, plus a fullname → login mapping that running
//! sheets need because PUMAPI identifies users there by full name only.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use tracing::{debug, error, info, warn};

use crate::booking::{BookingKind, PpmsBooking};
use crate::codec::{decode_single, decode_table, Record};
use crate::config::ConnectionConfig;
use crate::error::{PpmsError, Result};
use crate::gateway::RequestGateway;
use crate::http::{params, Params};
use crate::system::PpmsSystem;
use crate::user::PpmsUser;

/// Booking permission level of a user on a system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Deactivated,
    Autonomous,
    Novice,
    Superuser,
}

impl Permission {
    /// The single-letter code PUMAPI uses.
    pub fn code(self) -> &'static str {
        match self {
            Permission::Deactivated => "D",
            Permission::Autonomous => "A",
            Permission::Novice => "N",
            Permission::Superuser => "S",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Permission::Deactivated => "deactivated",
            Permission::Autonomous => "autonomous",
            Permission::Novice => "novice",
            Permission::Superuser => "superuser",
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Permission {
    type Err = PpmsError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "D" => Ok(Permission::Deactivated),
            "A" => Ok(Permission::Autonomous),
            "N" => Ok(Permission::Novice),
            "S" => Ok(Permission::Superuser),
            other => Err(PpmsError::invalid("permission", format!("invalid permission [{other}]"))),
        }
    }
}

/// Details for `newuser`.
#[derive(Debug, Clone, Default)]
pub struct NewUser {
    pub login: String,
    pub lname: String,
    pub fname: String,
    pub email: String,
    /// Primary group; PPMS creates it when it does not exist yet.
    pub ppms_group: String,
    pub phone: Option<String>,
    /// Without a password the user cannot log on to PPMS.
    pub password: Option<String>,
}

#[derive(Debug)]
pub struct PpmsClient {
    gateway: RequestGateway,
    users: BTreeMap<String, PpmsUser>,
    fullname_mapping: HashMap<String, String>,
    systems: BTreeMap<u32, PpmsSystem>,
}

fn response_lines(body: &str) -> Vec<String> {
    body.lines().map(str::to_string).collect()
}

impl PpmsClient {
    pub fn connect(config: &ConnectionConfig) -> Result<Self> {
        Ok(Self::from_gateway(RequestGateway::connect(config)?))
    }

    pub fn from_gateway(gateway: RequestGateway) -> Self {
        Self {
            gateway,
            users: BTreeMap::new(),
            fullname_mapping: HashMap::new(),
            systems: BTreeMap::new(),
        }
    }

    pub fn gateway(&self) -> &RequestGateway {
        &self.gateway
    }

    pub fn gateway_mut(&mut self) -> &mut RequestGateway {
        &mut self.gateway
    }

    // ---------------------------------------------------------------------
    // Users / groups
    // ---------------------------------------------------------------------

    pub fn new_user(&mut self, user: &NewUser) -> Result<()> {
        if self.user_exists(&user.login)? {
            warn!(login = %user.login, "NOT creating user as it already exists");
            return Ok(());
        }

        let mut p = params([
            ("login", user.login.as_str()),
            ("lname", user.lname.as_str()),
            ("fname", user.fname.as_str()),
            ("email", user.email.as_str()),
            ("unitlogin", user.ppms_group.as_str()),
        ]);
        if let Some(phone) = user.phone.as_deref().filter(|p| !p.is_empty()) {
            p.insert("phone".to_string(), phone.to_string());
        }
        if let Some(pwd) = user.password.as_deref().filter(|p| !p.is_empty()) {
            p.insert("pwd".to_string(), pwd.to_string());
        }

        let response = self.gateway.request("newuser", &p)?;
        if !response.body.contains("OK newuser") {
            error!(body = %response.body, "creating new user failed");
            return Err(PpmsError::Request {
                action: "newuser".to_string(),
                body: response.body,
            });
        }
        info!(login = %user.login, "created user in PPMS");
        Ok(())
    }

    /// Logins of all (or only active) users.
    pub fn get_user_ids(&mut self, active: bool) -> Result<Vec<String>> {
        let mut p = Params::new();
        if active {
            p.insert("active".to_string(), "true".to_string());
        }
        let response = self.gateway.request("getusers", &p)?;
        let users = response_lines(&response.body);
        info!(
            count = users.len(),
            "{}users in the PPMS database",
            if active { "active " } else { "" }
        );
        debug!("{}", users.join(", "));
        Ok(users)
    }

    fn fetch_user_body(&mut self, login: &str) -> Result<String> {
        let response = self.gateway.request("getuser", &params([("login", login)]))?;
        if response.body.is_empty() {
            error!(login, "user is unknown to PPMS");
            return Err(PpmsError::UnknownEntity {
                kind: "user",
                name: login.to_string(),
            });
        }
        Ok(response.body)
    }

    /// Raw user details as returned by PUMAPI.
    pub fn get_user_dict(&mut self, login: &str) -> Result<Record> {
        let body = self.fetch_user_body(login)?;
        let details = decode_single(&body, true)?;
        debug!(login, ?details, "user details");
        Ok(details)
    }

    /// Fetch a user and remember it.
    pub fn get_user(&mut self, login: &str) -> Result<PpmsUser> {
        let body = self.fetch_user_body(login)?;
        let user = PpmsUser::from_response(&body)?;
        self.fullname_mapping
            .insert(user.fullname(), user.username.clone());
        self.users.insert(user.username.clone(), user.clone());
        Ok(user)
    }

    pub fn user_exists(&mut self, login: &str) -> Result<bool> {
        match self.get_user(login) {
            Ok(_) => Ok(true),
            Err(PpmsError::UnknownEntity { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Users fetched so far, refreshed from PPMS when empty or forced.
    pub fn get_users(&mut self, force_refresh: bool) -> Result<&BTreeMap<String, PpmsUser>> {
        if self.users.is_empty() || force_refresh {
            self.update_users(&[])?;
        } else {
            debug!(count = self.users.len(), "using cached details for users");
        }
        Ok(&self.users)
    }

    /// Fetch details for the given logins, or for all active users when the
    /// list is empty. Slow on large instances.
    pub fn update_users(&mut self, user_ids: &[String]) -> Result<()> {
        let user_ids = if user_ids.is_empty() {
            self.get_user_ids(true)?
        } else {
            user_ids.to_vec()
        };
        debug!(count = user_ids.len(), "updating details on users");
        for login in &user_ids {
            self.get_user(login)?;
        }
        debug!(count = self.users.len(), "collected details on users");
        Ok(())
    }

    pub fn get_admins(&mut self) -> Result<Vec<PpmsUser>> {
        let response = self.gateway.request("getadmins", &Params::new())?;
        let admins = response_lines(&response.body);
        debug!(count = admins.len(), "admins in the PPMS database: {}", admins.join(", "));
        admins.iter().map(|login| self.get_user(login)).collect()
    }

    pub fn get_groups(&mut self) -> Result<Vec<String>> {
        let response = self.gateway.request("getgroups", &Params::new())?;
        let groups = response_lines(&response.body);
        debug!(count = groups.len(), "groups in the PPMS database: {}", groups.join(", "));
        Ok(groups)
    }

    pub fn get_group(&mut self, group_id: &str) -> Result<Record> {
        let response = self
            .gateway
            .request("getgroup", &params([("unitlogin", group_id)]))?;
        debug!(body = %response.body, "group details returned by PPMS (raw)");
        if response.body.is_empty() {
            error!(group_id, "group is unknown to PPMS");
            return Err(PpmsError::UnknownEntity {
                kind: "group",
                name: group_id.to_string(),
            });
        }
        let details = decode_single(&response.body, true)?;
        debug!(group_id, ?details, "group details");
        Ok(details)
    }

    pub fn get_group_users(&mut self, unitlogin: &str) -> Result<Vec<PpmsUser>> {
        let response = self
            .gateway
            .request("getgroupusers", &params([("unitlogin", unitlogin)]))?;
        let members = response_lines(&response.body);
        debug!(
            count = members.len(),
            unitlogin,
            "members in PPMS group: {}",
            members.join(", ")
        );
        members.iter().map(|login| self.get_user(login)).collect()
    }

    /// User experience ("user rights") entries, optionally filtered.
    pub fn get_user_experience(
        &mut self,
        login: Option<&str>,
        system_id: Option<u32>,
    ) -> Result<Vec<Record>> {
        let mut p = Params::new();
        if let Some(login) = login {
            p.insert("login".to_string(), login.to_string());
        }
        if let Some(id) = system_id {
            p.insert("id".to_string(), id.to_string());
        }
        let response = self.gateway.request("getuserexp", &p)?;
        let parsed = decode_table(&response.body, true)?.into_records();
        debug!(
            count = parsed.len(),
            ?login,
            ?system_id,
            "received experience entries"
        );
        Ok(parsed)
    }

    /// Email addresses of the given users, or of all (active) users. Slow.
    pub fn get_users_emails(&mut self, users: Option<&[String]>, active: bool) -> Result<Vec<String>> {
        let users = match users {
            Some(users) => users.to_vec(),
            None => self.get_user_ids(active)?,
        };
        let mut emails = Vec::new();
        for login in &users {
            let email = self
                .get_user_dict(login)?
                .get("email")
                .map(ToString::to_string)
                .unwrap_or_default();
            if email.is_empty() {
                warn!(login = %login, "no email for user");
                continue;
            }
            emails.push(email);
        }
        Ok(emails)
    }

    // ---------------------------------------------------------------------
    // Systems
    // ---------------------------------------------------------------------

    /// Systems fetched so far, refreshed from PPMS when empty or forced.
    pub fn get_systems(&mut self, force_refresh: bool) -> Result<&BTreeMap<u32, PpmsSystem>> {
        if self.systems.is_empty() || force_refresh {
            self.update_systems()?;
        } else {
            debug!(count = self.systems.len(), "using cached details for systems");
        }
        Ok(&self.systems)
    }

    /// Re-read all systems. Entries that fail to parse are skipped.
    pub fn update_systems(&mut self) -> Result<()> {
        debug!("updating list of bookable systems");
        let response = self.gateway.request("getsystems", &Params::new())?;
        let table = decode_table(&response.body, false)?;

        let mut systems = BTreeMap::new();
        let mut parse_fails = 0;
        for record in &table {
            match PpmsSystem::from_record(record) {
                Ok(system) => {
                    systems.insert(system.system_id, system);
                }
                Err(e) => {
                    error!(error = %e, "error processing `getsystems` response");
                    parse_fails += 1;
                }
            }
        }
        debug!(
            count = systems.len(),
            parse_fails, "updated bookable systems from PPMS"
        );
        self.systems = systems;
        Ok(())
    }

    /// IDs of systems whose localisation contains `localisation`
    /// (case-insensitive) and whose name contains any of `name_contains`.
    pub fn get_systems_matching(
        &mut self,
        localisation: &str,
        name_contains: &[&str],
    ) -> Result<Vec<u32>> {
        let loc = localisation.to_lowercase();
        info!(
            localisation,
            ?name_contains,
            "querying PPMS for matching systems"
        );

        let mut system_ids = Vec::new();
        for (id, system) in self.get_systems(false)? {
            if !system.localisation.to_lowercase().contains(&loc) {
                debug!(
                    name = %system.name,
                    localisation = %system.localisation,
                    "system location is NOT matching, ignoring"
                );
                continue;
            }
            if name_contains.iter().any(|valid| system.name.contains(valid)) {
                debug!(name = %system.name, "system matches all criteria");
                system_ids.push(*id);
            }
        }
        info!(count = system_ids.len(), localisation, "found bookable systems");
        Ok(system_ids)
    }

    // ---------------------------------------------------------------------
    // Permissions
    // ---------------------------------------------------------------------

    /// Logins allowed to book the system; deactivated (`D`) users are left out.
    pub fn get_users_with_access_to_system(&mut self, system_id: u32) -> Result<Vec<String>> {
        let response = self
            .gateway
            .request("getsysrights", &params([("id", system_id.to_string())]))?;

        let mut users = Vec::new();
        for line in response.body.lines() {
            let parts: Vec<&str> = line.split(':').collect();
            let [permission, username] = parts.as_slice() else {
                error!(body = %response.body, "unable to parse data returned by PUMAPI");
                return Err(PpmsError::format(
                    &response.body,
                    format!("expected `<permission>:<login>`, got {line:?}"),
                ));
            };
            if permission.eq_ignore_ascii_case("D") {
                debug!(username, system_id, "user is deactivated for booking system, skipping");
                continue;
            }
            debug!(username, system_id, "user has permission to book system");
            users.push(username.to_string());
        }
        Ok(users)
    }

    /// Set the permission level of `login` on a system.
    ///
    /// PUMAPI answers `done` for any permission code, so `true` only means
    /// the request was accepted.
    pub fn set_system_booking_permissions(
        &mut self,
        login: &str,
        system_id: u32,
        permission: Permission,
    ) -> Result<bool> {
        debug!(%permission, login, system_id, "setting permission level");
        let p = params([
            ("id", system_id.to_string()),
            ("login", login.to_string()),
            ("type", permission.code().to_string()),
        ]);
        let response = self.gateway.request("setright", &p)?;
        let body = response.body.to_lowercase();

        if body.trim() == "done" {
            debug!(login, %permission, system_id, "permission level set");
            return Ok(true);
        }
        if body.contains("invalid user") {
            warn!(login, "user doesn't seem to exist in PPMS");
        } else if body.contains("system right not authorized") {
            error!(system_id, body = %response.body, "unable to set permissions for system");
        } else {
            error!(body = %response.body, "unexpected response, assuming request failed");
        }
        Ok(false)
    }

    pub fn give_user_access_to_system(&mut self, login: &str, system_id: u32) -> Result<bool> {
        self.set_system_booking_permissions(login, system_id, Permission::Autonomous)
    }

    pub fn remove_user_access_from_system(&mut self, login: &str, system_id: u32) -> Result<bool> {
        self.set_system_booking_permissions(login, system_id, Permission::Deactivated)
    }

    // ---------------------------------------------------------------------
    // Bookings
    // ---------------------------------------------------------------------

    /// The current or next booking of a system.
    ///
    /// `None` when there is none, or when PUMAPI refuses the request. Note
    /// that PUMAPI silently ignores next bookings that are far in the future.
    pub fn get_booking(&mut self, system_id: u32, kind: BookingKind) -> Result<Option<PpmsBooking>> {
        let response = match self
            .gateway
            .request(kind.action(), &params([("id", system_id.to_string())]))
        {
            Ok(response) => response,
            Err(e) if e.is_connectivity() => {
                error!(system_id, error = %e, "requesting booking status failed");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        if response.body.trim().is_empty() {
            debug!(system_id, ?kind, "system doesn't have a booking");
            return Ok(None);
        }
        PpmsBooking::from_booking_response(&response.body, kind, system_id).map(Some)
    }

    pub fn get_current_booking(&mut self, system_id: u32) -> Result<Option<PpmsBooking>> {
        self.get_booking(system_id, BookingKind::Current)
    }

    pub fn get_next_booking(&mut self, system_id: u32) -> Result<Option<PpmsBooking>> {
        self.get_booking(system_id, BookingKind::Next)
    }

    /// All bookings of a facility on one day.
    ///
    /// Users are resolved through their full name, refreshing the user list
    /// once if a name is unknown. Entries whose user or system cannot be
    /// resolved are skipped, and an unparsable sheet yields no bookings.
    pub fn get_running_sheet(
        &mut self,
        core_facility_ref: &str,
        date: NaiveDate,
    ) -> Result<Vec<PpmsBooking>> {
        let day = date.format("%Y-%m-%d").to_string();
        let p = params([("plateformid", core_facility_ref), ("day", day.as_str())]);
        debug!(%day, "requesting runningsheet");
        let response = self.gateway.request("getrunningsheet", &p)?;

        let entries = match decode_table(&response.body, false) {
            Ok(table) => table.into_records(),
            Err(e) => {
                error!(error = %e, "parsing runningsheet details failed, possibly no bookings exist");
                debug!(body = %response.body, "runningsheet response");
                return Ok(Vec::new());
            }
        };

        let mut bookings = Vec::new();
        for entry in &entries {
            let Some(full) = entry.get("User").map(ToString::to_string) else {
                warn!(?entry, "runningsheet entry without user, skipping");
                continue;
            };
            if !self.fullname_mapping.contains_key(&full) {
                info!(fullname = %full, "booking for an uncached user found");
                self.update_users(&[])?;
            }
            let Some(login) = self.fullname_mapping.get(&full).cloned() else {
                error!(fullname = %full, "PPMS doesn't seem to know user, skipping");
                continue;
            };

            let object = entry.get("Object").map(ToString::to_string).unwrap_or_default();
            let Some(&system_id) = self.get_systems_matching("", &[object.as_str()])?.first() else {
                error!(object = %object, "no system with that name, skipping booking");
                continue;
            };

            info!(login = %login, fullname = %full, "booking for user found");
            bookings.push(PpmsBooking::from_running_sheet(entry, system_id, &login, date)?);
        }
        Ok(bookings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::tests::{online, ScriptedTransport};

    const USER_HEADER: &str =
        "login,lname,fname,email,phone,bcode,affiliation,unitlogin,mustchpwd,mustchbcode,active";

    fn user_body(login: &str, lname: &str, fname: &str) -> String {
        format!(
            "{USER_HEADER}\r\n\"{login}\",\"{lname}\",\"{fname}\",\"{login}@example.org\",\"\",\"\",\"\",\"grp\",false,false,true\r\n"
        )
    }

    fn client(transport: &ScriptedTransport) -> PpmsClient {
        PpmsClient::from_gateway(online(transport))
    }

    #[test]
    fn permission_codes() {
        assert_eq!("A".parse::<Permission>().unwrap(), Permission::Autonomous);
        assert_eq!(Permission::Superuser.code(), "S");
        assert_eq!(Permission::Novice.to_string(), "novice");
        assert!("X".parse::<Permission>().is_err());
    }

    #[test]
    fn get_user_and_unknown_user() {
        let transport = ScriptedTransport::default()
            .reply("getuser", &user_body("alice", "Liddell", "Alice"));
        let mut c = client(&transport);
        let user = c.get_user("alice").unwrap();
        assert_eq!(user.fullname(), "Liddell Alice");
        assert!(c.user_exists("alice").unwrap());

        let transport = ScriptedTransport::default().reply("getuser", "");
        let mut c = client(&transport);
        assert!(matches!(
            c.get_user("ghost"),
            Err(PpmsError::UnknownEntity { kind: "user", .. })
        ));
        assert!(!c.user_exists("ghost").unwrap());
    }

    #[test]
    fn user_ids_send_active_filter() {
        let transport = ScriptedTransport::default().reply("getusers", "alice\r\nbob\r\n");
        let mut c = client(&transport);
        assert_eq!(c.get_user_ids(true).unwrap(), ["alice", "bob"]);
        let sent = transport.last().unwrap();
        assert_eq!(sent.form.get("active").map(String::as_str), Some("true"));
        c.get_user_ids(false).unwrap();
        assert!(!transport.last().unwrap().form.contains_key("active"));
    }

    #[test]
    fn group_details() {
        let transport = ScriptedTransport::default().reply(
            "getgroup",
            "unitlogin,unitname,active\r\n\"grp\",\"Python Core Facility\",true\r\n",
        );
        let mut c = client(&transport);
        let group = c.get_group("grp").unwrap();
        assert_eq!(group.get_str("unitname"), Some("Python Core Facility"));
        assert_eq!(group.get_bool("active"), Some(true));
    }

    #[test]
    fn sysrights_skip_deactivated() {
        let transport = ScriptedTransport::default().reply("getsysrights", "A:alice\nD:bob\nN:carol\n");
        let mut c = client(&transport);
        assert_eq!(c.get_users_with_access_to_system(7).unwrap(), ["alice", "carol"]);

        let transport = ScriptedTransport::default().reply("getsysrights", "garbage\n");
        let mut c = client(&transport);
        assert!(matches!(
            c.get_users_with_access_to_system(7),
            Err(PpmsError::Format { .. })
        ));
    }

    #[test]
    fn setright_outcomes() {
        let transport = ScriptedTransport::default().reply("setright", "done\n");
        let mut c = client(&transport);
        assert!(c.give_user_access_to_system("alice", 7).unwrap());
        let sent = transport.last().unwrap();
        assert_eq!(sent.form.get("type").map(String::as_str), Some("A"));
        assert_eq!(sent.form.get("id").map(String::as_str), Some("7"));

        let transport = ScriptedTransport::default().reply("setright", "invalid user");
        let mut c = client(&transport);
        assert!(!c.remove_user_access_from_system("nobody", 7).unwrap());
    }

    #[test]
    fn systems_skip_unparsable_entries() {
        let body = "Core facility ref,System id,Type,Name,Localisation,Active,Schedules,Stats,\
            Bookable,Autonomy Required,Autonomy Required After Hours\n\
            \"2\",\"31\",\"VM\",\"VDI (Development)\",\"VDI\",true,true,true,false,true,false\n\
            \"2\",\"x\",\"VM\",\"Broken\",\"VDI\",true,true,true,false,true,false\n\
            \"2\",\"42\",\"Confocal\",\"Zeiss LSM 880\",\"Room 1.23\",true,true,true,true,true,false\n";
        let transport = ScriptedTransport::default().reply("getsystems", body);
        let mut c = client(&transport);
        let systems = c.get_systems(false).unwrap();
        assert_eq!(systems.keys().copied().collect::<Vec<_>>(), [31, 42]);

        assert_eq!(c.get_systems_matching("room", &["Zeiss", "Leica"]).unwrap(), [42]);
        assert_eq!(c.get_systems_matching("", &["VDI"]).unwrap(), [31]);
        assert!(c.get_systems_matching("", &[]).unwrap().is_empty());
        // the second lookup came from memory
        assert_eq!(transport.calls(), 2);
    }

    #[test]
    fn booking_lookup() {
        let transport = ScriptedTransport::default()
            .reply("getbooking", "alice\n30\n991\n")
            .reply("nextbooking", "\n");
        let mut c = client(&transport);
        let current = c.get_current_booking(31).unwrap().unwrap();
        assert_eq!(current.username, "alice");
        assert_eq!(current.session, "991");
        assert!(c.get_next_booking(31).unwrap().is_none());
    }

    #[test]
    fn refused_booking_lookup_is_none() {
        let transport = ScriptedTransport::default().reply("getbooking", "request not authorized");
        let mut c = client(&transport);
        assert!(c.get_current_booking(31).unwrap().is_none());
    }

    #[test]
    fn new_user_is_skipped_when_it_exists() {
        let transport = ScriptedTransport::default().reply("getuser", &user_body("alice", "L", "A"));
        let mut c = client(&transport);
        let user = NewUser {
            login: "alice".into(),
            ..NewUser::default()
        };
        c.new_user(&user).unwrap();
        assert_eq!(transport.last().unwrap().form.get("action").map(String::as_str), Some("getuser"));
    }

    #[test]
    fn new_user_failure_is_reported() {
        let transport = ScriptedTransport::default()
            .reply("getuser", "")
            .reply("newuser", "Error: unknown group");
        let mut c = client(&transport);
        let user = NewUser {
            login: "dave".into(),
            password: Some("pw".into()),
            ..NewUser::default()
        };
        let err = c.new_user(&user).unwrap_err();
        assert!(matches!(err, PpmsError::Request { .. }));
        let sent = transport.last().unwrap();
        assert_eq!(sent.form.get("pwd").map(String::as_str), Some("pw"));
        assert!(!sent.form.contains_key("phone"));
    }

    #[test]
    fn running_sheet_resolves_users_and_systems() {
        let systems = "Core facility ref,System id,Type,Name,Localisation,Active,Schedules,Stats,\
            Bookable,Autonomy Required,Autonomy Required After Hours\n\
            \"2\",\"42\",\"Confocal\",\"Zeiss LSM 880\",\"Room 1.23\",true,true,true,true,true,false\n";
        let sheet = "Location,Start time,End time,Object,User,Training,Assistance\n\
            \"Room 1.23\",\"09:00:00\",\"11:30:00\",\"Zeiss LSM 880\",\"Liddell Alice\",\"\",\"\"\n\
            \"Room 1.23\",\"12:00:00\",\"13:00:00\",\"Zeiss LSM 880\",\"Nobody Known\",\"\",\"\"\n";
        let transport = ScriptedTransport::default()
            .reply("getsystems", systems)
            .reply("getrunningsheet", sheet)
            .reply("getusers", "alice\n")
            .reply("getuser", &user_body("alice", "Liddell", "Alice"));
        let mut c = client(&transport);

        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        let bookings = c.get_running_sheet("2", date).unwrap();
        assert_eq!(bookings.len(), 1);
        assert_eq!(bookings[0].username, "alice");
        assert_eq!(bookings[0].system_id, 42);
        assert_eq!(bookings[0].start, date.and_hms_opt(9, 0, 0).unwrap());
    }

    #[test]
    fn empty_running_sheet_yields_nothing() {
        let transport = ScriptedTransport::default().reply("getrunningsheet", "");
        let mut c = client(&transport);
        let date = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert!(c.get_running_sheet("2", date).unwrap().is_empty());
    }
}
