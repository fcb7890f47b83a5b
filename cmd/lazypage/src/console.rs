//! Interactive read/write console over a registered region.
//!
//! ```text
//! r <page>     dump the start of a page      (<page> = -1 for all)
//! w <page>     prompt for a line, store it at offset 0 of the page
//! d <page>     release the page; the next touch faults again
//! q            quit
//! ```
//!
//! The page may follow the command on the same line or come on its own
//! line after a prompt. Touching a page here is an ordinary memory access:
//! if it is not backed yet the fault handler supplies it first.

use lazypage_core::error::{PagerError, Result};
use lazypage_core::region::PageSelector;
use lazypage_module::mmap_region::MmapRegion;

use std::io::{BufRead, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Read,
    Write,
    Discard,
    Quit,
}

impl Command {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "r" | "read" => Some(Command::Read),
            "w" | "write" => Some(Command::Write),
            "d" | "discard" => Some(Command::Discard),
            "q" | "quit" => Some(Command::Quit),
            _ => None,
        }
    }
}

/// Reads input one line at a time and hands it out as whitespace tokens.
///
/// The current line is kept whole with a cursor, so the text after a
/// `w <page>` on the same line can be taken byte for byte.
struct Tokens<R> {
    input: R,
    line: String,
    pos: usize,
}

impl<R: BufRead> Tokens<R> {
    fn new(input: R) -> Self {
        Self { input, line: String::new(), pos: 0 }
    }

    /// Replace the current line. `false` at end of input.
    fn refill(&mut self) -> Result<bool> {
        self.line.clear();
        self.pos = 0;
        let n = self.input.read_line(&mut self.line).map_err(PagerError::Console)?;
        Ok(n > 0)
    }

    fn rest(&self) -> &str {
        &self.line[self.pos..]
    }

    fn has_pending(&self) -> bool {
        !self.rest().trim().is_empty()
    }

    fn next(&mut self) -> Result<Option<String>> {
        while !self.has_pending() {
            if !self.refill()? {
                return Ok(None);
            }
        }
        let rest = self.rest();
        let skipped = rest.len() - rest.trim_start().len();
        let start = self.pos + skipped;
        let word = &self.line[start..];
        let len = word.find(char::is_whitespace).unwrap_or(word.len());
        self.pos = start + len;
        Ok(Some(self.line[start..start + len].to_string()))
    }

    /// Rest of the current line, or the next full line if nothing is left.
    ///
    /// Only the one separator before the text and the line ending are
    /// dropped; inner and leading spaces are kept.
    fn text(&mut self) -> Result<Option<String>> {
        if !self.has_pending() && !self.refill()? {
            return Ok(None);
        }
        let rest = self.rest().trim_end_matches(&['\r', '\n'][..]);
        let rest = if self.pos > 0 { rest.strip_prefix([' ', '\t']).unwrap_or(rest) } else { rest };
        let text = rest.to_string();
        self.discard_line();
        Ok(Some(text))
    }

    fn discard_line(&mut self) {
        self.pos = self.line.len();
    }
}

pub struct Console<'a> {
    region: &'a MmapRegion,
    preview: usize,
}

impl<'a> Console<'a> {
    pub fn new(region: &'a MmapRegion, preview: usize) -> Self {
        Self { region, preview }
    }

    /// Serve commands until `q` or end of input.
    pub fn run<R: BufRead, W: Write>(&self, input: R, mut out: W) -> Result<()> {
        let mut tokens = Tokens::new(input);
        let pages = self.region.pages();

        loop {
            if !tokens.has_pending() {
                say(&mut out, "Which command should I run? (r:read, w:write, d:discard, q:quit)")?;
            }
            let Some(word) = tokens.next()? else { return Ok(()) };
            let Some(cmd) = Command::parse(&word.to_lowercase()) else {
                say(&mut out, &format!("Unknown command '{}'", word))?;
                tokens.discard_line();
                continue;
            };
            if cmd == Command::Quit {
                return Ok(());
            }

            if !tokens.has_pending() {
                say(&mut out, &format!("For which page? (0-{}, or -1 for all)", pages - 1))?;
            }
            let Some(arg) = tokens.next()? else { return Ok(()) };
            let sel = match PageSelector::parse(&arg, pages) {
                Ok(sel) => sel,
                Err(PagerError::Usage(msg)) => {
                    say(&mut out, &msg)?;
                    tokens.discard_line();
                    continue;
                }
                Err(e) => return Err(e),
            };

            match cmd {
                Command::Read => self.read(sel, &mut out)?,
                Command::Write => {
                    if !tokens.has_pending() {
                        say(&mut out, "Enter string to be written")?;
                    }
                    let Some(text) = tokens.text()? else { return Ok(()) };
                    match self.write(sel, &text, &mut out) {
                        Err(PagerError::Usage(msg)) => say(&mut out, &msg)?,
                        other => other?,
                    }
                }
                Command::Discard => {
                    self.region.advise_not_needed(sel)?;
                    for i in sel.indices(pages) {
                        say(&mut out, &format!("[*] Page {} released", i))?;
                    }
                }
                Command::Quit => unreachable!(),
            }
        }
    }

    fn read<W: Write>(&self, sel: PageSelector, out: &mut W) -> Result<()> {
        let mut buf = vec![0u8; self.region.page_size()];
        for i in sel.indices(self.region.pages()) {
            self.region.read_page(i, &mut buf)?;
            say(out, &format!("[*] Page {}:\n{}", i, render_preview(&buf, self.preview)))?;
        }
        Ok(())
    }

    fn write<W: Write>(&self, sel: PageSelector, text: &str, out: &mut W) -> Result<()> {
        for i in sel.indices(self.region.pages()) {
            self.region.write_page(i, text.as_bytes())?;
            say(out, &format!("[*] Page {} written with {}", i, text))?;
        }
        Ok(())
    }
}

/// Printable view of the first `limit` bytes of a page, up to the first NUL.
pub fn render_preview(page: &[u8], limit: usize) -> String {
    page.iter()
        .take(limit)
        .take_while(|&&b| b != 0)
        .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
        .collect()
}

fn say<W: Write>(out: &mut W, line: &str) -> Result<()> {
    writeln!(out, "{}", line).and_then(|_| out.flush()).map_err(PagerError::Console)
}
