// Exit codes for CI triage
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_SCENARIO_FAIL: i32 = 1;
pub const EXIT_USAGE: i32 = 2;
