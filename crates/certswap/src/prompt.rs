//! Interactive setup for a rotation run

use crate::cli::RotateArgs;
use cs_cdn::TokenMode;
use cs_common::EnvConfig;
use std::io::{self, BufRead, Write};

struct Prompter<R, W> {
    input: R,
    out: W,
}

impl<R: BufRead, W: Write> Prompter<R, W> {
    /// Trimmed answer, empty at end of input
    fn ask(&mut self, question: &str) -> io::Result<String> {
        write!(self.out, "{}: ", question)?;
        self.out.flush()?;
        let mut line = String::new();
        self.input.read_line(&mut line)?;
        Ok(line.trim().to_string())
    }

    /// Replace `target` when the answer is non-empty
    fn ask_into(&mut self, question: &str, target: &mut String) -> io::Result<()> {
        let answer = self.ask(question)?;
        if !answer.is_empty() {
            *target = answer;
        }
        Ok(())
    }

    fn ask_optional(&mut self, question: &str, target: &mut Option<String>) -> io::Result<()> {
        let answer = self.ask(question)?;
        if !answer.is_empty() {
            *target = Some(answer);
        }
        Ok(())
    }

    fn confirm(&mut self, question: &str) -> io::Result<bool> {
        let answer = self.ask(question)?.to_ascii_lowercase();
        Ok(answer == "y" || answer == "yes")
    }
}

/// Walk the operator through the run settings, updating `args` in place.
///
/// Returns `Ok(false)` when the operator declines the final confirmation.
pub fn run_wizard<R: BufRead, W: Write>(
    args: &mut RotateArgs,
    env: &EnvConfig,
    input: R,
    out: W,
) -> io::Result<bool> {
    let mut p = Prompter { input, out };

    let mode = p.ask("Mode [1=full rotation, 2=Qiniu certificate only] (default 1)")?;
    if mode == "2" {
        args.qiniu_only = true;
    } else if mode == "1" {
        args.qiniu_only = false;
    }

    p.ask_optional(
        "Base domain, e.g. example.com (may be empty in certificate-only mode)",
        &mut args.domain,
    )?;

    if !args.qiniu_only {
        let question = format!("Host record to take offline, rr-a (default {})", args.rr_a);
        p.ask_into(&question, &mut args.rr_a)?;
        let question = format!("Host record to enable, rr-b (default {})", args.rr_b);
        p.ask_into(&question, &mut args.rr_b)?;
        p.ask_optional("Record type, e.g. A (empty for any)", &mut args.record_type)?;
        p.ask_optional("Value filter for rr-a (optional)", &mut args.value_a)?;
        p.ask_optional("Value filter for rr-b (optional)", &mut args.value_b)?;
    }

    p.ask_optional(
        "Certificate domain (optional, defaults to the newest directory or rr-a.domain)",
        &mut args.cert_domain,
    )?;

    if args.qiniu_ak.is_none() && env.qiniu_access_key.is_none() {
        p.ask_optional("Qiniu AccessKey", &mut args.qiniu_ak)?;
    }
    if args.qiniu_sk.is_none() && env.qiniu_secret_key.is_none() {
        p.ask_optional("Qiniu SecretKey", &mut args.qiniu_sk)?;
    }

    let question = format!("Qiniu token mode [auto|v1|v2] (default {})", args.qiniu_token);
    let answer = p.ask(&question)?;
    if !answer.is_empty() {
        match answer.parse::<TokenMode>() {
            Ok(mode) => args.qiniu_token = mode,
            Err(e) => writeln!(p.out, "{}, keeping {}", e, args.qiniu_token)?,
        }
    }

    if p.confirm("Ignore the minimum rotation interval? [y/N]")? {
        args.force = true;
    }

    writeln!(
        p.out,
        "mode: {}  domain: {}  rr-a: {}  rr-b: {}  type: {}  cert-domain: {}  token: {}  force: {}",
        if args.qiniu_only { "certificate-only" } else { "full" },
        args.domain.as_deref().unwrap_or("-"),
        args.rr_a,
        args.rr_b,
        args.record_type.as_deref().unwrap_or("any"),
        args.cert_domain.as_deref().unwrap_or("-"),
        args.qiniu_token,
        args.force,
    )?;

    if !p.confirm("Proceed? [y/N]")? {
        writeln!(p.out, "cancelled")?;
        return Ok(false);
    }
    Ok(true)
}
