pub mod alphabet;
pub mod fold;
pub mod interaction;
pub mod notation;
pub mod partition;
pub mod stockholm;
pub mod structs;
pub mod util;
