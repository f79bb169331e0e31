//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter        | Implements         | Connects to                  |
//! |----------------|--------------------|------------------------------|
//! | `hardware`     | WateringHardware   | any `BoardChip` (valve, pump)|
//! | `time`         | TimeProvider       | atomics, set by commands     |
//! | `console_sink` | EventSink          | operator terminal            |

pub mod console_sink;
pub mod hardware;
pub mod time;
