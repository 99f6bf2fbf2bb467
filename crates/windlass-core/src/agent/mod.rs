//! Agent planner: flat tool plans executed under a planning style.

pub mod planner;
