use crate::context::Context;
use crate::error::Halt;
use crate::pipeline::Toolchain;

/// A toolchain that transforms nothing and marks each stage it reached.
///
/// After a complete run the context holds `prepare = "prepared"`,
/// `compile = "compiled"`, `assemble = "assembled"`, `link = "linked"` and
/// `finalize = "finalized"`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullToolchain;

impl Toolchain for NullToolchain {
    fn name(&self) -> &str {
        "null"
    }

    fn prepare(&self, ctx: &mut Context) -> Result<(), Halt> {
        ctx.insert("prepare", "prepared");
        Ok(())
    }

    fn compile(&self, ctx: &mut Context) -> Result<(), Halt> {
        ctx.insert("compile", "compiled");
        Ok(())
    }

    fn assemble(&self, ctx: &mut Context) -> Result<(), Halt> {
        ctx.insert("assemble", "assembled");
        Ok(())
    }

    fn link(&self, ctx: &mut Context) -> Result<(), Halt> {
        ctx.insert("link", "linked");
        Ok(())
    }

    fn finalize(&self, ctx: &mut Context) -> Result<(), Halt> {
        ctx.insert("finalize", "finalized");
        Ok(())
    }
}
