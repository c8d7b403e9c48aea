//! Domain models for cohort.
//!
//! # Core Concepts
//!
//! ## Roster Entities
//!
//! - [`Project`]: The unit of work. Carries the participation mode and the
//!   join / group-formation deadlines every roster mutation is checked against.
//! - [`Participant`]: One person's enrollment in a project. Points at its
//!   current [`Group`] (if any) and holds its [`GroupRole`] there.
//! - [`Group`]: A numbered collection of participants in a TEAM project. A group
//!   never owns its participants; membership lives on the participant row.
//! - [`JoinRequest`]: A pending ask by an unplaced participant to enter a group.
//!   Requests are deleted once they are resolved.
//!
//! ## Work Entities
//!
//! - [`Sprint`]: A bounded work cycle owned by a group (planned, active, completed).
//! - [`WorkItem`]: A unit of work in a group's backlog, optionally attached to a sprint.
//!   Completing a sprint re-parents every unfinished item in one step.

mod group;
mod participant;
mod project;
mod sprint;
mod work_item;

pub use group::*;
pub use participant::*;
pub use project::*;
pub use sprint::*;
pub use work_item::*;

use serde::{Deserialize, Deserializer};

/// Distinguishes "field absent" (`None`) from "field set to null" (`Some(None)`)
/// for partial updates that may clear a nullable column.
pub(crate) fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}
