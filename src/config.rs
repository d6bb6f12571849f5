// ABOUTME: Configuration and constants for the Monkey interpreter
// This module contains version info, REPL text, and the VM size limits

pub const VERSION: &str = "1.0.0";
pub const WELCOME_MESSAGE: &str = "Monkey v1.0";
pub const WELCOME_SUBTITLE: &str =
    "Tree-walking interpreter and bytecode VM for the Monkey language";

pub const PROMPT: &str = ">> ";
pub const HISTORY_FILE: &str = ".monkey_history";

/// Sizes of the VM's fixed-capacity structures. Configurable per VM
/// instance, fixed once the VM is constructed.
#[derive(Debug, Clone, Copy)]
pub struct VmLimits {
    /// Value stack slots.
    pub stack_size: usize,
    /// Global binding slots addressable by `OpGetGlobal`/`OpSetGlobal`.
    pub globals_size: usize,
    /// Call depth before the frame stack overflows.
    pub max_frames: usize,
}

impl Default for VmLimits {
    fn default() -> Self {
        Self {
            stack_size: 2048,
            globals_size: 65536,
            max_frames: 1024,
        }
    }
}
