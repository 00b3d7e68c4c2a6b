//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter    | Implements                     | Connects to                  |
//! |------------|--------------------------------|------------------------------|
//! | `log_sink` | EventSink                      | `log` facade                 |
//! | `nvs`      | NvsPort                        | In-memory image (file-backed in the simulator) |
//! | `sim`      | Host, MotionPort, DelayNs      | Simulated machine            |
//! |            | OutputPin, SetDutyCycle        | Observable outputs / servo   |
//! |            | ArcVoltagePort                 | Scriptable voltage source    |

pub mod log_sink;
pub mod nvs;
pub mod sim;
