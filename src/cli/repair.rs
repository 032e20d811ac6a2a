//! Fix-refs command

use crate::cli::confirm;
use crate::cli::context::CommandContext;
use crate::cli::style::{Stylize, arrow, check};
use anstream::println;
use ghchain::error::Result;
use ghchain::repair::{apply_ref_fix, find_ref_fixes};

/// `ghchain fix-refs [--yes]`
pub fn run_fix_refs(ctx: &CommandContext, yes: bool) -> Result<bool> {
    let fixes = find_ref_fixes(ctx.vcs(), &ctx.config)?;
    if fixes.is_empty() {
        println!("{}", "All stack branches point at their commits".muted());
        return Ok(true);
    }

    let mut applied = 0;
    for fix in &fixes {
        let from = fix.from.as_deref().map_or("(missing)", |sha| &sha[..sha.len().min(8)]);
        println!(
            "{}: {from} {} {} {}",
            fix.branch.accent(),
            arrow(),
            fix.to[..fix.to.len().min(8)].accent(),
            fix.summary
        );
        if !yes && !confirm(&format!("Move {}?", fix.branch), true)? {
            continue;
        }
        apply_ref_fix(ctx.vcs(), fix)?;
        applied += 1;
    }

    println!("{} Moved {} of {} branch(es)", check(), applied.accent(), fixes.len());
    Ok(true)
}
