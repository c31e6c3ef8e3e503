//! Declarative access-control tables: one per message family. Each is a
//! flat, statically-built lookup (`lazy_static!`), not a general rule
//! engine -- new rows are added, never conditional logic.

pub mod action;
pub mod attribute;
pub mod certmgmt;
pub mod keymgmt;
pub mod mechanism;
