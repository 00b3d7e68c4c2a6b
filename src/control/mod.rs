//! Closed-loop control: the PID law and the policy that turns its output
//! into discrete actuation.

pub mod pid;
pub mod threshold;
