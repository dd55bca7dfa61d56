// src/lua.rs - Lua scripts for atomic store operations
use redis::Script;

pub struct LuaScripts {
    /// Atomically moves every due member of the delayed set onto the tail of
    /// the ready list. Running it as a single script closes the
    /// read-then-delete race between concurrent workers.
    pub migrate_delayed: Script,
}

impl LuaScripts {
    pub fn new() -> Self {
        Self {
            migrate_delayed: Script::new(include_str!("./lua/migrate_delayed.lua")),
        }
    }
}

impl Default for LuaScripts {
    fn default() -> Self {
        Self::new()
    }
}
