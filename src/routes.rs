use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;
use std::str::FromStr;

use tracing::{debug, info};

use crate::as_path::{clean_as_path, origin_asn};
use crate::prefix::Prefix;
use crate::shared::{AnalysisError, ParseError, ASN};

/// Column layout of a raw `bgpdump -m` record:
/// `TABLE_DUMP2|time|B|peer_ip|peer_as|prefix|as_path|origin|...`
const DUMP_PREFIX_COLUMN: usize = 5;
const DUMP_AS_PATH_COLUMN: usize = 6;
const DUMP_MIN_COLUMNS: usize = 7;

/// One announced route from the table snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnouncedRoute {
    pub prefix: Prefix,
    pub origin_asn: ASN,
    pub as_path: Vec<String>,
}

impl AnnouncedRoute {
    pub fn new(prefix: Prefix, as_path: &str) -> Result<Self, ParseError> {
        let as_path = clean_as_path(as_path);
        Ok(AnnouncedRoute {
            prefix,
            origin_asn: origin_asn(&as_path).ok_or(ParseError::EmptyAsPath)?,
            as_path,
        })
    }

    /// Parses either a filtered `prefix|as_path` line or a full
    /// `bgpdump -m` record.
    pub fn from_line(line: &str) -> Result<Self, ParseError> {
        let columns: Vec<&str> = line.split('|').collect();
        let (prefix, as_path) = if columns.len() >= DUMP_MIN_COLUMNS {
            (columns[DUMP_PREFIX_COLUMN], columns[DUMP_AS_PATH_COLUMN])
        } else if columns.len() >= 2 {
            (columns[0], columns[1])
        } else {
            return Err(ParseError::MissingColumns(columns.len()));
        };

        AnnouncedRoute::new(prefix.parse()?, as_path)
    }
}

impl FromStr for AnnouncedRoute {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AnnouncedRoute::from_line(s)
    }
}

/// Routes read from one snapshot, with the rows that were dropped.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    pub routes: Vec<AnnouncedRoute>,
    pub skipped_rows: usize,
}

impl RouteTable {
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Reads routes line by line. Blank lines and `#` comments are ignored;
/// malformed rows, IPv4 prefixes and empty paths are skipped and counted.
pub fn read_routes<R: BufRead>(reader: R) -> io::Result<RouteTable> {
    let mut table = RouteTable::default();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        match AnnouncedRoute::from_line(trimmed) {
            Ok(route) => table.routes.push(route),
            Err(e) => {
                debug!(line = index + 1, error = %e, "skipping route row");
                table.skipped_rows += 1;
            }
        }
    }

    Ok(table)
}

pub fn load_routes(path: &Path) -> Result<RouteTable, AnalysisError> {
    let input_error = |source| AnalysisError::Input {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(input_error)?;
    let table = read_routes(BufReader::new(file)).map_err(input_error)?;

    info!(
        path = %path.display(),
        routes = table.len(),
        skipped = table.skipped_rows,
        "loaded routing table"
    );
    Ok(table)
}
