//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module     | Commands handled               |
//! |------------|--------------------------------|
//! | `serve`    | `Serve`, `InitDb`              |
//! | `catalog`  | `Breed`, `Hatch`               |
//! | `calendar` | `Calendar`, `Week`             |
//! | `cutoff`   | `Cutoff`                       |
//! | `config`   | `Config`                       |

pub mod calendar;
pub mod catalog;
pub mod config;
pub mod cutoff;
pub mod serve;

pub use calendar::{cmd_calendar, cmd_week};
pub use catalog::{cmd_breed, cmd_hatch};
pub use config::cmd_config;
pub use cutoff::cmd_cutoff;
pub use serve::{cmd_init_db, cmd_serve};
