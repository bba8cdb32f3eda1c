mod activity;
mod principal;

pub use activity::{
    Activity, ActivityStatus, Importance, format_date, format_time, parse_date, parse_time,
    parse_timestamp,
};
pub use principal::{Principal, Role, default_principals};
