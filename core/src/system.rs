//! Bookable systems (instruments, workstations, ...) known to PPMS.

use std::fmt;

use tracing::{error, trace};

use crate::codec::Record;
use crate::error::{PpmsError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PpmsSystem {
    pub system_id: u32,
    pub name: String,
    /// The "Room" field in the PPMS web interface.
    pub localisation: String,
    pub system_type: String,
    pub core_facility_ref: String,
    pub schedules: bool,
    pub active: bool,
    pub stats: bool,
    pub bookable: bool,
    pub autonomy_required: bool,
    pub autonomy_required_after_hours: bool,
}

impl PpmsSystem {
    /// Build a system from one record of a `getsystems` response.
    pub fn from_record(details: &Record) -> Result<Self> {
        let text = |key: &str| -> Result<String> {
            details
                .get(key)
                .map(ToString::to_string)
                .ok_or_else(|| PpmsError::invalid("system", format!("missing field `{key}`")))
        };
        let flag = |key: &str| -> Result<bool> {
            details.get_bool(key).ok_or_else(|| {
                PpmsError::invalid("system", format!("field `{key}` is not a boolean"))
            })
        };

        let raw_id = text("System id")?;
        let system_id = raw_id.trim().parse::<u32>().map_err(|e| {
            error!(id = %raw_id, error = %e, "unable to parse system ID");
            PpmsError::invalid("system", format!("system ID {raw_id:?}: {e}"))
        })?;

        let system = Self {
            system_id,
            name: text("Name")?,
            localisation: text("Localisation")?,
            system_type: text("Type")?,
            core_facility_ref: text("Core facility ref")?,
            schedules: flag("Schedules")?,
            active: flag("Active")?,
            stats: flag("Stats")?,
            bookable: flag("Bookable")?,
            autonomy_required: flag("Autonomy Required")?,
            autonomy_required_after_hours: flag("Autonomy Required After Hours")?,
        };
        trace!(
            system_id = system.system_id,
            name = %system.name,
            localisation = %system.localisation,
            system_type = %system.system_type,
            "PpmsSystem initialized"
        );
        Ok(system)
    }
}

impl fmt::Display for PpmsSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "system_id: {}, name: {}, localisation: {}, system_type: {}, \
             core_facility_ref: {}, schedules: {}, active: {}, stats: {}, \
             bookable: {}, autonomy_required: {}, autonomy_required_after_hours: {}",
            self.system_id,
            self.name,
            self.localisation,
            self.system_type,
            self.core_facility_ref,
            self.schedules,
            self.active,
            self.stats,
            self.bookable,
            self.autonomy_required,
            self.autonomy_required_after_hours
        )
    }
}
