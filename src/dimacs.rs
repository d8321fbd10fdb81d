//! CNF loader for DIMACS files.
//!
//! The format:
//!
//! - Comments start with `c`. Two comment forms carry information:
//!   - `c order <v1> <v2> ...` suggests a variable order (1-based, may span
//!     several comment lines);
//!   - `c feature <id> <name>` and the FeatureIDE form `c <id> <name>` name a
//!     variable.
//! - Problem line: `p cnf <num_vars> <num_clauses>`
//! - Clauses are whitespace-separated signed integers, each clause terminated
//!   by `0`. A clause may span lines, a line may hold several clauses, and the
//!   end of the file terminates a pending clause. A line starting with `%`
//!   ends the clause section.
//!
//! The loader is tolerant: unparsable tokens, a malformed header and literals
//! out of range are recorded as [`Diagnostic`]s and skipped. Variable counts
//! are capped by [`LoaderOptions::max_vars`], so a single stray literal such
//! as `99999999` cannot blow up the variable space. The only hard
//! failure is an input from which no variable count can be derived at all.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use log::{debug, warn};

use crate::error::{Error, Result};
use crate::types::{Lit, Var};

/// Knobs of the loader.
#[derive(Debug, Clone)]
pub struct LoaderOptions {
    /// Use `max(declared, largest literal)` as the variable count, tolerating a
    /// missing or wrong header. When false, a present header is trusted and
    /// literals beyond it are dropped.
    pub widen_to_observed: bool,
    /// Largest accepted variable count. Literals beyond it are dropped and a
    /// header declaring more is ignored. Never above [`Var::MAX_ID`].
    pub max_vars: usize,
}

pub const DEFAULT_MAX_VARS: usize = 1 << 20;

impl Default for LoaderOptions {
    fn default() -> Self {
        Self {
            widen_to_observed: true,
            max_vars: DEFAULT_MAX_VARS,
        }
    }
}

impl LoaderOptions {
    fn var_limit(&self) -> usize {
        self.max_vars.min(Var::MAX_ID as usize)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    InvalidToken(String),
    LiteralOutOfRange(i32),
    MalformedHeader(String),
    InvalidOrderHint(String),
    ClauseCountMismatch { declared: usize, parsed: usize },
}

/// A non-fatal problem found while loading. `line` is 1-based, 0 when the
/// problem is not tied to a line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: usize,
    pub kind: DiagnosticKind,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.line > 0 {
            write!(f, "line {}: ", self.line)?;
        }
        match &self.kind {
            DiagnosticKind::InvalidToken(token) => write!(f, "skipped invalid token '{}'", token),
            DiagnosticKind::LiteralOutOfRange(lit) => {
                write!(f, "dropped literal {} beyond the variable count", lit)
            }
            DiagnosticKind::MalformedHeader(header) => write!(f, "malformed header '{}'", header),
            DiagnosticKind::InvalidOrderHint(token) => {
                write!(f, "ignored invalid order hint '{}'", token)
            }
            DiagnosticKind::ClauseCountMismatch { declared, parsed } => {
                write!(f, "header declares {} clauses but {} were parsed", declared, parsed)
            }
        }
    }
}

/// A loaded CNF formula. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct Cnf {
    /// Effective number of variables.
    pub num_vars: usize,
    pub declared_vars: Option<usize>,
    pub declared_clauses: Option<usize>,
    pub clauses: Vec<Vec<Lit>>,
    /// Occurrence count per variable, indexed by `Var::index()`.
    pub frequency: Vec<usize>,
    /// Order suggested by `c order` comments, as given.
    pub suggested_order: Option<Vec<Var>>,
    pub names: BTreeMap<Var, String>,
    pub diagnostics: Vec<Diagnostic>,
}

impl Cnf {
    /// Build a formula from DIMACS-style clauses over `num_vars` variables.
    ///
    /// Literals beyond `num_vars` (and stray zeros) are dropped and recorded
    /// as diagnostics.
    pub fn from_clauses(num_vars: usize, clauses: impl IntoIterator<Item = Vec<i32>>) -> Self {
        let mut cnf = Cnf::empty(num_vars);
        for clause in clauses {
            cnf.push_clause(0, &clause);
        }
        cnf
    }

    fn empty(num_vars: usize) -> Self {
        Self {
            num_vars,
            declared_vars: None,
            declared_clauses: None,
            clauses: Vec::new(),
            frequency: vec![0; num_vars],
            suggested_order: None,
            names: BTreeMap::new(),
            diagnostics: Vec::new(),
        }
    }

    fn push_clause(&mut self, line: usize, raw: &[i32]) {
        let mut clause = Vec::with_capacity(raw.len());
        for &value in raw {
            if value == 0 || value == i32::MIN {
                self.diagnostics.push(Diagnostic {
                    line,
                    kind: DiagnosticKind::InvalidToken(value.to_string()),
                });
            } else if value.unsigned_abs() as usize > self.num_vars {
                self.diagnostics.push(Diagnostic {
                    line,
                    kind: DiagnosticKind::LiteralOutOfRange(value),
                });
            } else {
                let lit = Lit::from_dimacs(value);
                self.frequency[lit.var().index()] += 1;
                clause.push(lit);
            }
        }
        self.clauses.push(clause);
    }

    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    /// All variables `1..=num_vars`.
    pub fn vars(&self) -> impl Iterator<Item = Var> {
        (0..self.num_vars).map(Var::from_index)
    }

    pub fn frequency(&self, var: Var) -> usize {
        self.frequency[var.index()]
    }

    pub fn name(&self, var: Var) -> Option<&str> {
        self.names.get(&var).map(String::as_str)
    }

    /// Number of literals dropped because they referenced unknown variables.
    pub fn dropped_literals(&self) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| matches!(d.kind, DiagnosticKind::LiteralOutOfRange(_)))
            .count()
    }
}

/// Parse a DIMACS CNF formula from a file.
pub fn load_dimacs(path: impl AsRef<Path>, options: &LoaderOptions) -> Result<Cnf> {
    let file = File::open(path.as_ref())?;
    parse_dimacs(file, options)
}

/// Parse a DIMACS CNF formula from a string.
pub fn parse_dimacs_str(input: &str, options: &LoaderOptions) -> Result<Cnf> {
    parse_dimacs(input.as_bytes(), options)
}

/// Parse a DIMACS CNF formula from a reader.
pub fn parse_dimacs<R: Read>(reader: R, options: &LoaderOptions) -> Result<Cnf> {
    let reader = BufReader::new(reader);
    let limit = options.var_limit();

    let mut declared_vars = None;
    let mut declared_clauses = None;
    // (line where the clause started, raw literals)
    let mut raw_clauses: Vec<(usize, Vec<i32>)> = Vec::new();
    let mut current: Option<(usize, Vec<i32>)> = None;
    let mut max_var = 0usize;
    let mut order_hint: Vec<Var> = Vec::new();
    let mut names = BTreeMap::new();
    let mut diagnostics = Vec::new();

    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        let line_no = i + 1;
        let line = line.trim();

        if line.is_empty() {
            continue;
        }

        if line.starts_with('c') {
            parse_comment(line, line_no, &mut order_hint, &mut names, &mut diagnostics);
            continue;
        }

        if line.starts_with('p') {
            let (vars, clauses) = parse_header(line, line_no, limit, &mut diagnostics);
            declared_vars = vars.or(declared_vars);
            declared_clauses = clauses.or(declared_clauses);
            continue;
        }

        if line.starts_with('%') {
            break;
        }

        for token in line.split_whitespace() {
            match token.parse::<i32>() {
                Ok(0) => {
                    let clause = current.take().unwrap_or((line_no, Vec::new()));
                    raw_clauses.push(clause);
                }
                Ok(i32::MIN) => diagnostics.push(Diagnostic {
                    line: line_no,
                    kind: DiagnosticKind::InvalidToken(token.to_string()),
                }),
                Ok(value) => {
                    // Literals beyond the limit are dropped by `push_clause`.
                    let magnitude = value.unsigned_abs() as usize;
                    if magnitude <= limit {
                        max_var = max_var.max(magnitude);
                    }
                    current
                        .get_or_insert_with(|| (line_no, Vec::new()))
                        .1
                        .push(value);
                }
                Err(_) => diagnostics.push(Diagnostic {
                    line: line_no,
                    kind: DiagnosticKind::InvalidToken(token.to_string()),
                }),
            }
        }
    }

    // End of input terminates the last clause.
    if let Some(clause) = current.take() {
        raw_clauses.push(clause);
    }

    let declared = declared_vars.unwrap_or(0);
    let num_vars = if options.widen_to_observed || declared == 0 {
        declared.max(max_var)
    } else {
        declared
    };
    if num_vars == 0 {
        return Err(Error::parse(
            "no variable count could be derived from the header or the clauses",
        ));
    }

    let mut cnf = Cnf::empty(num_vars);
    cnf.declared_vars = declared_vars;
    cnf.declared_clauses = declared_clauses;
    cnf.diagnostics = diagnostics;
    for (line, raw) in &raw_clauses {
        cnf.push_clause(*line, raw);
    }

    if let Some(declared) = declared_clauses {
        if declared != cnf.num_clauses() {
            warn!("Expected {} clauses but parsed {}", declared, cnf.num_clauses());
            cnf.diagnostics.push(Diagnostic {
                line: 0,
                kind: DiagnosticKind::ClauseCountMismatch {
                    declared,
                    parsed: cnf.num_clauses(),
                },
            });
        }
    }

    cnf.names = names
        .into_iter()
        .filter(|(var, _): &(Var, String)| var.index() < num_vars)
        .collect();

    if !order_hint.is_empty() {
        let (valid, invalid): (Vec<Var>, Vec<Var>) =
            order_hint.into_iter().partition(|v| v.index() < num_vars);
        for var in invalid {
            cnf.diagnostics.push(Diagnostic {
                line: 0,
                kind: DiagnosticKind::InvalidOrderHint(var.id().to_string()),
            });
        }
        cnf.suggested_order = Some(valid);
    }

    for diagnostic in &cnf.diagnostics {
        debug!("{}", diagnostic);
    }
    if !cnf.diagnostics.is_empty() {
        warn!("{} diagnostics while loading CNF", cnf.diagnostics.len());
    }

    Ok(cnf)
}

fn parse_header(
    line: &str,
    line_no: usize,
    limit: usize,
    diagnostics: &mut Vec<Diagnostic>,
) -> (Option<usize>, Option<usize>) {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let malformed = || Diagnostic {
        line: line_no,
        kind: DiagnosticKind::MalformedHeader(line.to_string()),
    };

    if parts.len() < 4 || parts[0] != "p" || parts[1] != "cnf" {
        diagnostics.push(malformed());
        return (None, None);
    }

    let vars = parts[2].parse::<usize>().ok().filter(|&n| n <= limit);
    let clauses = parts[3].parse::<usize>().ok();
    if vars.is_none() || clauses.is_none() || parts.len() > 4 {
        diagnostics.push(malformed());
    }
    (vars, clauses)
}

fn parse_comment(
    line: &str,
    line_no: usize,
    order_hint: &mut Vec<Var>,
    names: &mut BTreeMap<Var, String>,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.first() != Some(&"c") || parts.len() < 2 {
        return;
    }

    match parts[1] {
        "order" => {
            for token in &parts[2..] {
                match parse_var(token) {
                    Some(var) => order_hint.push(var),
                    None => diagnostics.push(Diagnostic {
                        line: line_no,
                        kind: DiagnosticKind::InvalidOrderHint(token.to_string()),
                    }),
                }
            }
        }
        "feature" if parts.len() >= 4 => {
            if let Some(var) = parse_var(parts[2]) {
                names.insert(var, parts[3..].join(" "));
            }
        }
        token if parts.len() >= 3 => {
            if let Some(var) = parse_var(token) {
                names.insert(var, parts[2..].join(" "));
            }
        }
        _ => {}
    }
}

/// A positive variable ID within `1..=Var::MAX_ID`.
fn parse_var(token: &str) -> Option<Var> {
    match token.parse::<u32>() {
        Ok(id @ 1..=Var::MAX_ID) => Some(Var::new(id)),
        _ => None,
    }
}
