//! In-memory stand-in for a PPMS instance's PUMAPI endpoint.
//!
//! Every request is a form POST to `/pumapi/` carrying `action` and `apikey`.
//! Like the real service, answers are always HTTP 200: failures show up in
//! the body (`request not authorized`, an empty body for unknown entities,
//! `invalid user`, ...).

use std::{
    collections::{BTreeMap, HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

use axum::{extract::State, routing::post, Form, Router};
use serde::Deserialize;
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info, warn};

pub const UNAUTHORIZED: &str = "request not authorized";

const USER_HEADER: &str =
    "login,lname,fname,email,phone,bcode,affiliation,unitlogin,mustchpwd,mustchbcode,active";
const SYSTEM_HEADER: &str = "Core facility ref,System id,Type,Name,Localisation,Active,Schedules,\
    Stats,Bookable,Autonomy Required,Autonomy Required After Hours";
const GROUP_HEADER: &str = "unitlogin,unitname,headname,heademail,active";

#[derive(Clone, Debug)]
pub struct User {
    pub login: String,
    pub lname: String,
    pub fname: String,
    pub email: String,
    pub unitlogin: String,
    pub active: bool,
}

impl User {
    fn new(login: &str, lname: &str, fname: &str, unitlogin: &str, active: bool) -> Self {
        Self {
            login: login.to_string(),
            lname: lname.to_string(),
            fname: fname.to_string(),
            email: format!("{login}@facility.example"),
            unitlogin: unitlogin.to_string(),
            active,
        }
    }

    fn fullname(&self) -> String {
        format!("{} {}", self.lname, self.fname)
    }

    /// `getuser` answer, CRLF terminated like the real thing.
    fn to_response(&self) -> String {
        format!(
            "{USER_HEADER}\r\n\"{}\",\"{}\",\"{}\",\"{}\",\"\",\"\",\"\",\"{}\",false,false,{}\r\n",
            self.login, self.lname, self.fname, self.email, self.unitlogin, self.active
        )
    }
}

#[derive(Clone, Debug)]
pub struct System {
    pub id: u32,
    pub facility: String,
    pub kind: String,
    pub name: String,
    pub room: String,
    pub bookable: bool,
}

impl System {
    fn to_row(&self) -> String {
        format!(
            "\"{}\",\"{}\",\"{}\",\"{}\",\"{}\",true,true,true,{},true,false",
            self.facility, self.id, self.kind, self.name, self.room, self.bookable
        )
    }
}

struct Inner {
    api_key: String,
    revoked: HashSet<String>,
    requests: AtomicUsize,
    users: RwLock<BTreeMap<String, User>>,
    admins: Vec<String>,
    groups: BTreeMap<String, String>,
    systems: Vec<System>,
    /// `(system id, login)` → permission code.
    rights: RwLock<BTreeMap<(u32, String), String>>,
    /// `(action, system id)` → raw booking answer.
    bookings: HashMap<(String, u32), String>,
}

/// Shared server state. Cloning shares the same data.
#[derive(Clone)]
pub struct Pumapi {
    inner: Arc<Inner>,
}

impl Pumapi {
    /// A small facility: two groups, three users and two systems.
    pub fn new(api_key: &str) -> Self {
        let users = [
            User::new("alice", "Liddell", "Alice", "wonderland", true),
            User::new("bob", "Builder", "Bob", "construction", false),
            User::new("carol", "Danvers", "Carol", "wonderland", true),
        ];
        let systems = vec![
            System {
                id: 31,
                facility: "2".to_string(),
                kind: "Confocal".to_string(),
                name: "Zeiss LSM 880".to_string(),
                room: "Room 1.23".to_string(),
                bookable: true,
            },
            System {
                id: 42,
                facility: "2".to_string(),
                kind: "Virtual Machine".to_string(),
                name: "VDI (Development)".to_string(),
                room: "VDI".to_string(),
                bookable: false,
            },
        ];
        let rights = [
            ((31, "alice"), "A"),
            ((31, "bob"), "D"),
            ((31, "carol"), "N"),
            ((42, "alice"), "S"),
        ];
        let bookings = HashMap::from([
            (("getbooking".to_string(), 31), "alice\n42\n12345\n".to_string()),
            (("nextbooking".to_string(), 31), "carol\n90\n\n".to_string()),
        ]);

        Self {
            inner: Arc::new(Inner {
                api_key: api_key.to_string(),
                revoked: HashSet::new(),
                requests: AtomicUsize::new(0),
                users: RwLock::new(users.into_iter().map(|u| (u.login.clone(), u)).collect()),
                admins: vec!["carol".to_string()],
                groups: BTreeMap::from([
                    ("wonderland".to_string(), "Wonderland Imaging".to_string()),
                    ("construction".to_string(), "Construction Lab".to_string()),
                ]),
                systems,
                rights: RwLock::new(
                    rights
                        .into_iter()
                        .map(|((id, login), p)| ((id, login.to_string()), p.to_string()))
                        .collect(),
                ),
                bookings,
            }),
        }
    }

    /// Answer `action` with the unauthorized marker even for a valid key.
    ///
    /// Only takes effect before the state is shared (cloned or handed to a
    /// running server); afterwards the call is logged and ignored.
    pub fn with_revoked(mut self, action: &str) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => {
                inner.revoked.insert(action.to_string());
            }
            None => warn!(action, "state already shared, revocation ignored"),
        }
        self
    }

    /// Whether `action` is answered with the unauthorized marker.
    pub fn is_revoked(&self, action: &str) -> bool {
        self.inner.revoked.contains(action)
    }

    /// Number of requests served so far.
    pub fn request_count(&self) -> usize {
        self.inner.requests.load(Ordering::SeqCst)
    }
}

pub fn app(pumapi: Pumapi) -> Router {
    Router::new()
        .route("/pumapi/", post(dispatch))
        .with_state(pumapi)
}

pub async fn run(listener: TcpListener, pumapi: Pumapi) -> Result<(), std::io::Error> {
    axum::serve(listener, app(pumapi)).await
}

/// One PUMAPI call: the action, the key and whatever else the action takes.
#[derive(Debug, Deserialize)]
pub struct PumapiRequest {
    pub action: String,
    #[serde(default)]
    pub apikey: String,
    #[serde(flatten)]
    pub params: HashMap<String, String>,
}

type Params = HashMap<String, String>;

fn field<'a>(form: &'a Params, key: &str) -> &'a str {
    form.get(key).map(String::as_str).unwrap_or_default()
}

async fn dispatch(State(pumapi): State<Pumapi>, Form(request): Form<PumapiRequest>) -> String {
    let inner = &pumapi.inner;
    inner.requests.fetch_add(1, Ordering::SeqCst);
    let action = request.action.as_str();
    let form = &request.params;
    debug!(action, "PUMAPI request");

    if request.apikey != inner.api_key || inner.revoked.contains(action) {
        info!(action, "rejecting request");
        return UNAUTHORIZED.to_string();
    }

    match action {
        "auth" => "authentication successful".to_string(),
        "getuser" => get_user(inner, field(form, "login")).await,
        "getusers" => get_users(inner, field(form, "active") == "true").await,
        "getadmins" => lines(inner.admins.iter()),
        "getgroups" => lines(inner.groups.keys()),
        "getgroup" => get_group(inner, field(form, "unitlogin")),
        "getgroupusers" => get_group_users(inner, field(form, "unitlogin")).await,
        "newuser" => new_user(inner, form).await,
        "getsystems" => get_systems(inner),
        "getsysrights" => get_sysrights(inner, field(form, "id")).await,
        "setright" => set_right(inner, form).await,
        "getuserexp" => get_user_exp(inner, form).await,
        "getbooking" | "nextbooking" => get_booking(inner, action, field(form, "id")),
        "getrunningsheet" => get_running_sheet(inner, field(form, "plateformid")).await,
        other => format!("error: unknown action {other}"),
    }
}

fn lines<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|s| format!("{}\r\n", s.as_ref()))
        .collect()
}

async fn get_user(inner: &Inner, login: &str) -> String {
    let users = inner.users.read().await;
    users.get(login).map(User::to_response).unwrap_or_default()
}

async fn get_users(inner: &Inner, active_only: bool) -> String {
    let users = inner.users.read().await;
    lines(
        users
            .values()
            .filter(|u| u.active || !active_only)
            .map(|u| u.login.as_str()),
    )
}

fn get_group(inner: &Inner, unitlogin: &str) -> String {
    match inner.groups.get(unitlogin) {
        Some(name) => format!(
            "{GROUP_HEADER}\r\n\"{unitlogin}\",\"{name}\",\"Head\",\"head@facility.example\",true\r\n"
        ),
        None => String::new(),
    }
}

async fn get_group_users(inner: &Inner, unitlogin: &str) -> String {
    let users = inner.users.read().await;
    lines(
        users
            .values()
            .filter(|u| u.unitlogin == unitlogin)
            .map(|u| u.login.as_str()),
    )
}

async fn new_user(inner: &Inner, form: &Params) -> String {
    let user = User {
        login: field(form, "login").to_string(),
        lname: field(form, "lname").to_string(),
        fname: field(form, "fname").to_string(),
        email: field(form, "email").to_string(),
        unitlogin: field(form, "unitlogin").to_string(),
        active: true,
    };
    if user.login.is_empty() {
        return "error: login is required".to_string();
    }
    info!(login = %user.login, "creating user");
    inner.users.write().await.insert(user.login.clone(), user);
    "OK newuser".to_string()
}

fn get_systems(inner: &Inner) -> String {
    let mut out = format!("{SYSTEM_HEADER}\n");
    for system in &inner.systems {
        out.push_str(&system.to_row());
        out.push('\n');
    }
    out
}

async fn get_sysrights(inner: &Inner, id: &str) -> String {
    let Ok(id) = id.parse::<u32>() else {
        return String::new();
    };
    let rights = inner.rights.read().await;
    lines(
        rights
            .iter()
            .filter(|((system, _), _)| *system == id)
            .map(|((_, login), p)| format!("{p}:{login}")),
    )
}

async fn set_right(inner: &Inner, form: &Params) -> String {
    let login = field(form, "login");
    let Some(id) = field(form, "id")
        .parse::<u32>()
        .ok()
        .filter(|id| inner.systems.iter().any(|s| s.id == *id))
    else {
        return "error: system right not authorized".to_string();
    };
    if !inner.users.read().await.contains_key(login) {
        return "error: invalid user".to_string();
    }
    inner
        .rights
        .write()
        .await
        .insert((id, login.to_string()), field(form, "type").to_string());
    "done".to_string()
}

async fn get_user_exp(inner: &Inner, form: &Params) -> String {
    let login = form.get("login");
    let id = form.get("id");
    let rights = inner.rights.read().await;
    let mut out = "login,id,booked_hours,last_res\r\n".to_string();
    for ((system, user), _) in rights.iter() {
        if login.is_some_and(|l| l != user) || id.is_some_and(|i| *i != system.to_string()) {
            continue;
        }
        out.push_str(&format!("\"{user}\",{system},3,\"2024-03-01\"\r\n"));
    }
    out
}

fn get_booking(inner: &Inner, action: &str, id: &str) -> String {
    id.parse::<u32>()
        .ok()
        .and_then(|id| inner.bookings.get(&(action.to_string(), id)).cloned())
        .unwrap_or_default()
}

async fn get_running_sheet(inner: &Inner, facility: &str) -> String {
    let users = inner.users.read().await;
    let mut out = "Location,Start time,End time,Object,User,Training,Assistance\r\n".to_string();
    for system in inner.systems.iter().filter(|s| s.facility == facility && s.bookable) {
        for (login, start, end) in [("alice", "09:00:00", "11:30:00"), ("carol", "13:00:00", "14:00:00")] {
            if let Some(user) = users.get(login) {
                out.push_str(&format!(
                    "\"{}\",\"{start}\",\"{end}\",\"{}\",\"{}\",\"\",\"\"\r\n",
                    system.room,
                    system.name,
                    user.fullname()
                ));
            }
        }
    }
    out
}
