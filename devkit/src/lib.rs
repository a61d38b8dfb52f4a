/*!
# PingPlot DevKit - scripted probes and test helpers

Lets scheduler and monitor tests run without touching the network:
- `ScriptedProbe`: per-host scripted replies, delays, failures, hangs and panics
- `TestHarness`: a monitor wired to a scripted probe, with slot assertions
- fixtures: settings files in throwaway directories
*/

pub mod fixtures;
pub mod probe_stub;
pub mod test_utils;

pub use fixtures::{settings, SettingsFixture};
pub use probe_stub::{Behavior, ProbeCall, ScriptedProbe};
pub use test_utils::{init_tracing, TestHarness};
