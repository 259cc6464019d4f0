/*
 * adapter.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Execution adapter for template bodies.
 *
 * A normalized body is lowered to Lua, wrapped in a chunk that receives its
 * bindings as arguments, and compiled once. Each render calls the compiled
 * chunk again with fresh bindings:
 *
 * - `print(...)` / `echo(...)` append `tostring` of every argument to the output
 * - `scope` is the template's scope converted to a Lua value
 * - `render(source, options, scope)` renders a nested template inline
 */

use std::cell::RefCell;

use mlua::{Function, Lua, LuaSerdeExt, SerializeOptions, Value, Variadic};

use crate::error::Result;
use crate::lowering;

const PRELUDE: &str = "local print, echo, scope, render = ...\n";

/// Callback used by the `render` binding.
///
/// Receives the child source, its options and scope as JSON, and returns
/// the child's output.
pub type NestedRender<'a> =
    dyn Fn(&str, Option<serde_json::Value>, Option<serde_json::Value>) -> Result<String> + 'a;

/// A compiled template body.
#[derive(Debug, Clone)]
pub struct Program {
    function: Function,
}

/// Result of one call: everything emitted before the call returned, and the
/// error that stopped it, if any.
#[derive(Debug)]
pub struct Execution {
    pub output: String,
    pub error: Option<mlua::Error>,
}

impl Execution {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct LuaAdapter {
    lua: Lua,
}

impl Default for LuaAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl LuaAdapter {
    pub fn new() -> Self {
        Self { lua: Lua::new() }
    }

    /// Lower and compile a normalized body. `name` shows up in Lua error
    /// messages.
    pub fn compile(&self, body: &str, name: &str) -> mlua::Result<Program> {
        let source = lowering::lower(body);
        let function = self
            .lua
            .load(format!("{PRELUDE}{source}"))
            .set_name(format!("={name}"))
            .into_function()?;
        Ok(Program { function })
    }

    /// Run a program with the given scope.
    pub fn call(
        &self,
        program: &Program,
        scope: &serde_json::Value,
        nested: &NestedRender<'_>,
    ) -> Execution {
        let sink = RefCell::new(String::new());

        let result = self.lua.scope(|s| {
            let emit = s.create_function(|lua, args: Variadic<Value>| {
                let tostring: Function = lua.globals().get("tostring")?;
                for arg in args {
                    let text: String = tostring.call(arg)?;
                    sink.borrow_mut().push_str(&text);
                }
                Ok(())
            })?;

            let render = s.create_function(
                |lua, (source, options, child_scope): (String, Option<Value>, Option<Value>)| {
                    let options = options
                        .map(|v| lua.from_value::<serde_json::Value>(v))
                        .transpose()?;
                    let child_scope = child_scope
                        .map(|v| lua.from_value::<serde_json::Value>(v))
                        .transpose()?;
                    let output =
                        nested(&source, options, child_scope)
                            .map_err(|e| mlua::Error::RuntimeError(e.to_string()))?;
                    sink.borrow_mut().push_str(&output);
                    Ok(())
                },
            )?;

            let scope_value = self.scope_value(scope)?;
            program
                .function
                .call::<()>((emit.clone(), emit, scope_value, render))
        });

        Execution {
            output: sink.into_inner(),
            error: result.err(),
        }
    }

    /// JSON nulls become `nil`; a missing scope is an empty table so field
    /// lookups read as `nil` instead of failing.
    fn scope_value(&self, scope: &serde_json::Value) -> mlua::Result<Value> {
        if scope.is_null() {
            return Ok(Value::Table(self.lua.create_table()?));
        }
        let options = SerializeOptions::new()
            .serialize_none_to_null(false)
            .serialize_unit_to_null(false);
        self.lua.to_value_with(scope, options)
    }
}
