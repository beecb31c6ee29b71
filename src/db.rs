//! An SQLite database storing marker sequences and pairwise alignments of oriented reads.
//!
//! The store is the immutable input of every mini-assembly invocation.
//! Marker tokens are stored per oriented read in table `Markers`, with the
//! canonical encoding of the oriented read as the primary key. Alignments are
//! stored in their strand-canonical form (first read on strand 0) in table
//! `Alignments`, with the delta-compressed ordinal pairs as a blob payload.
//!
//! See [`AlignmentBase`] for opening and creating a store, [`StoreInterface`]
//! for the read contract used by the analysis pipeline, and [`StoreData`] for
//! building a store in memory.

use crate::{Alignment, AlignmentRecord, OrientedReadId, MarkerToken, ReadId, Strand};
use crate::{Error, Result};
use crate::{formats, utils};
use crate::utils::VarintIter;

use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::Path;

use rusqlite::{Connection, OpenFlags, OptionalExtension, Statement};


//-----------------------------------------------------------------------------

/// A database connection to an alignment store.
///
/// This structure stores a database connection and some header information.
/// In multi-threaded applications, each thread should have its own connection.
/// Read operations are supported through the [`StoreInterface`] structure.
///
/// # Examples
///
/// ```
/// use mini_assembly::{AlignmentBase, StoreData, OrientedReadId, StoreInterface};
/// use mini_assembly::utils;
/// use std::fs;
///
/// // Build the store contents in memory.
/// let mut data = StoreData::new();
/// data.add_markers(0, 0, vec![10, 11, 12]).unwrap();
/// data.add_markers(0, 1, vec![22, 21, 20]).unwrap();
/// data.add_markers(1, 0, vec![10, 11, 12]).unwrap();
/// data.add_markers(1, 1, vec![22, 21, 20]).unwrap();
/// data.add_alignment(0, 1, true, vec![[0, 0], [1, 1], [2, 2]]).unwrap();
///
/// // Create the database.
/// let db_file = utils::temp_file_name("alignment-base");
/// assert!(AlignmentBase::create(&data, &db_file).is_ok());
///
/// // Open it and check the header.
/// let database = AlignmentBase::open(&db_file).unwrap();
/// assert_eq!(database.reads(), 2);
/// assert_eq!(database.alignments(), 1);
///
/// // Query it.
/// let mut interface = StoreInterface::new(&database).unwrap();
/// assert_eq!(interface.marker_count(OrientedReadId::new(0, 0)).unwrap(), 3);
/// assert_eq!(interface.alignment_ids(1).unwrap(), vec![0]);
///
/// // Clean up.
/// drop(interface);
/// drop(database);
/// fs::remove_file(&db_file).unwrap();
/// ```
#[derive(Debug)]
pub struct AlignmentBase {
    pub(crate) connection: Connection,
    version: String,
    reads: usize,
    alignments: usize,
}

/// Using the database.
impl AlignmentBase {
    // Key for database version.
    const KEY_VERSION: &'static str = "version";

    /// Current database version.
    pub const VERSION: &'static str = "mini-assembly v0.1.0";

    // Key for read count.
    const KEY_READS: &'static str = "reads";

    // Key for alignment count.
    const KEY_ALIGNMENTS: &'static str = "alignments";

    /// Opens a connection to the store in the given file.
    ///
    /// Reads the header information from table `Tags`.
    /// Returns [`Error::ResourceNotReady`] if the file does not exist, is not an
    /// alignment store, or has an unsupported version.
    pub fn open<P: AsRef<Path>>(filename: P) -> Result<Self> {
        if !utils::file_exists(&filename) {
            return Err(Error::ResourceNotReady(format!(
                "Store {} does not exist", filename.as_ref().display()
            )));
        }
        let flags = OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let connection = Connection::open_with_flags(filename, flags)?;

        // Get the header information.
        let mut get_tag = connection.prepare(
            "SELECT value FROM Tags WHERE key = ?1"
        ).map_err(|x| Error::ResourceNotReady(format!("Not an alignment store: {}", x)))?;
        let version = get_string_value(&mut get_tag, Self::KEY_VERSION)?;
        if version != Self::VERSION {
            return Err(Error::ResourceNotReady(format!(
                "Unsupported store version: {} (expected {})", version, Self::VERSION
            )));
        }
        let reads = get_numeric_value(&mut get_tag, Self::KEY_READS)?;
        let alignments = get_numeric_value(&mut get_tag, Self::KEY_ALIGNMENTS)?;
        drop(get_tag);

        Ok(AlignmentBase {
            connection,
            version,
            reads, alignments,
        })
    }

    /// Returns the filename of the database or [`None`] if there is no filename.
    pub fn filename(&self) -> Option<&str> {
        self.connection.path()
    }

    /// Returns the size of the database file in a human-readable format.
    pub fn file_size(&self) -> Option<String> {
        let filename = self.filename()?;
        utils::file_size(filename)
    }

    /// Returns the version of the database.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns the number of reads in the store.
    pub fn reads(&self) -> usize {
        self.reads
    }

    /// Returns the number of stored alignments.
    pub fn alignments(&self) -> usize {
        self.alignments
    }
}

//-----------------------------------------------------------------------------

// Tag access used when opening a store.

fn get_string_value(statement: &mut Statement, key: &str) -> Result<String> {
    let result: Option<String> = statement.query_row(
        (key,),
        |row| row.get(0)
    ).optional()?;
    result.ok_or(Error::ResourceNotReady(format!("Missing tag: {}", key)))
}

fn get_numeric_value(statement: &mut Statement, key: &str) -> Result<usize> {
    let value = get_string_value(statement, key)?;
    value.parse().map_err(|_| {
        Error::ResourceNotReady(format!("Invalid numeric tag {}: {}", key, value))
    })
}

//-----------------------------------------------------------------------------

/// Creating the database.
impl AlignmentBase {
    /// Creates a new store from the given in-memory data.
    ///
    /// Returns an error if the database already exists or the data is inconsistent.
    /// Passes through any database errors.
    pub fn create<P: AsRef<Path>>(data: &StoreData, filename: P) -> Result<()> {
        if utils::file_exists(&filename) {
            return Err(Error::Database(format!(
                "Database {} already exists", filename.as_ref().display()
            )));
        }
        data.sanity_checks()?;

        let mut connection = Connection::open(filename)?;
        Self::insert_tags(data, &mut connection)?;
        Self::insert_markers(data, &mut connection)?;
        Self::insert_alignments(data, &mut connection)?;
        Ok(())
    }

    /// Creates a new store from text input files.
    ///
    /// Both files may be gzip-compressed; see [`crate::formats`] for the line formats.
    ///
    /// # Arguments
    ///
    /// * `markers_file`: Marker tokens, one oriented read per line.
    /// * `alignments_file`: Stored alignments, one per line.
    /// * `db_file`: Name of the database file to be created.
    pub fn create_from_files(markers_file: &Path, alignments_file: &Path, db_file: &Path) -> Result<()> {
        let mut data = StoreData::new();

        let reader = utils::open_file(markers_file).map_err(Error::Io)?;
        let mut line_num = 0;
        for line in reader.lines() {
            let line = line?;
            line_num += 1;
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (read_id, strand, tokens) = formats::parse_marker_line(&line, line_num)?;
            data.add_markers(read_id, strand, tokens)?;
        }

        let reader = utils::open_file(alignments_file).map_err(Error::Io)?;
        let mut line_num = 0;
        for line in reader.lines() {
            let line = line?;
            line_num += 1;
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (read0, read1, is_same_strand, ordinals) = formats::parse_alignment_line(&line, line_num)?;
            data.add_alignment(read0, read1, is_same_strand, ordinals)?;
        }

        Self::create(&data, db_file)
    }

    fn insert_tags(data: &StoreData, connection: &mut Connection) -> Result<()> {
        connection.execute(
            "CREATE TABLE Tags (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            ) STRICT",
            (),
        )?;

        let transaction = connection.transaction()?;
        {
            let mut insert = transaction.prepare(
                "INSERT INTO Tags(key, value) VALUES (?1, ?2)"
            )?;
            insert.execute((Self::KEY_VERSION, Self::VERSION))?;
            insert.execute((Self::KEY_READS, data.read_count().to_string()))?;
            insert.execute((Self::KEY_ALIGNMENTS, data.alignment_count().to_string()))?;
        }
        transaction.commit()?;
        Ok(())
    }

    fn insert_markers(data: &StoreData, connection: &mut Connection) -> Result<()> {
        connection.execute(
            "CREATE TABLE Markers (
                oriented_read INTEGER PRIMARY KEY,
                marker_count INTEGER NOT NULL,
                tokens BLOB NOT NULL
            ) STRICT",
            (),
        )?;

        let transaction = connection.transaction()?;
        {
            let mut insert = transaction.prepare(
                "INSERT INTO Markers(oriented_read, marker_count, tokens) VALUES (?1, ?2, ?3)"
            )?;
            for (oriented_value, tokens) in data.markers.iter() {
                let mut blob = Vec::new();
                for token in tokens.iter() {
                    utils::encode_varint(*token, &mut blob);
                }
                insert.execute((*oriented_value, tokens.len(), blob))?;
            }
        }
        transaction.commit()?;
        Ok(())
    }

    fn insert_alignments(data: &StoreData, connection: &mut Connection) -> Result<()> {
        connection.execute(
            "CREATE TABLE Alignments (
                id INTEGER PRIMARY KEY,
                read0 INTEGER NOT NULL,
                read1 INTEGER NOT NULL,
                same_strand INTEGER NOT NULL,
                marker_count INTEGER NOT NULL,
                payload BLOB NOT NULL
            ) STRICT",
            (),
        )?;

        let transaction = connection.transaction()?;
        {
            let mut insert = transaction.prepare(
                "INSERT INTO Alignments(id, read0, read1, same_strand, marker_count, payload)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)"
            )?;
            for (id, (record, alignment)) in data.alignments.iter().enumerate() {
                insert.execute((
                    id,
                    record.read_ids[0], record.read_ids[1],
                    record.is_same_strand as i64,
                    record.marker_count,
                    alignment.compress(),
                ))?;
            }
        }
        transaction.commit()?;

        connection.execute("CREATE INDEX AlignmentsByRead0 ON Alignments(read0)", ())?;
        connection.execute("CREATE INDEX AlignmentsByRead1 ON Alignments(read1)", ())?;
        Ok(())
    }
}

//-----------------------------------------------------------------------------

/// In-memory contents of an alignment store.
///
/// Marker tokens are added per oriented read with [`StoreData::add_markers`].
/// Both orientations of a read must be added before the store is created, and
/// they must have the same length. Alignments are added in their stored form:
/// first read on strand 0, second read on strand 0 or 1 depending on the
/// same-strand flag. Consistency is checked at insertion and again in
/// [`AlignmentBase::create`].
#[derive(Clone, Debug, Default)]
pub struct StoreData {
    // Marker tokens by the canonical encoding of the oriented read.
    markers: BTreeMap<u32, Vec<MarkerToken>>,
    alignments: Vec<(AlignmentRecord, Alignment)>,
}

impl StoreData {
    /// Creates an empty store.
    pub fn new() -> Self {
        StoreData::default()
    }

    /// Returns the number of reads with stored markers on at least one strand.
    pub fn read_count(&self) -> usize {
        let mut result = 0;
        let mut prev: Option<ReadId> = None;
        for oriented_value in self.markers.keys() {
            let read_id = OrientedReadId::from_value(*oriented_value).read_id();
            if prev != Some(read_id) {
                result += 1;
                prev = Some(read_id);
            }
        }
        result
    }

    /// Returns the number of alignments.
    pub fn alignment_count(&self) -> usize {
        self.alignments.len()
    }

    /// Returns the number of markers in the given oriented read, or [`None`] if unknown.
    pub fn marker_count(&self, oriented_read: OrientedReadId) -> Option<usize> {
        self.markers.get(&oriented_read.value()).map(|tokens| tokens.len())
    }

    /// Adds the marker tokens for one oriented read.
    ///
    /// Returns [`Error::DataIntegrity`] if the oriented read already has markers.
    pub fn add_markers(&mut self, read_id: ReadId, strand: Strand, tokens: Vec<MarkerToken>) -> Result<()> {
        let oriented_read = OrientedReadId::new(read_id, strand);
        if self.markers.contains_key(&oriented_read.value()) {
            return Err(Error::DataIntegrity(format!(
                "Duplicate marker sequence for oriented read {}", oriented_read
            )));
        }
        self.markers.insert(oriented_read.value(), tokens);
        Ok(())
    }

    /// Adds an alignment in its stored strand-canonical form.
    ///
    /// The first read is on strand 0 and the second on strand 0 or 1 depending on
    /// `is_same_strand`. Returns the alignment id.
    ///
    /// # Errors
    ///
    /// Returns [`Error::DataIntegrity`] if either oriented read has no markers,
    /// the ordinals are not strictly increasing, or an ordinal is out of range.
    pub fn add_alignment(
        &mut self,
        read0: ReadId, read1: ReadId, is_same_strand: bool,
        ordinals: Vec<[u32; 2]>
    ) -> Result<u32> {
        let oriented0 = OrientedReadId::new(read0, 0);
        let oriented1 = OrientedReadId::new(read1, if is_same_strand { 0 } else { 1 });
        let count0 = self.marker_count(oriented0).ok_or(Error::DataIntegrity(format!(
            "No markers stored for oriented read {}", oriented0
        )))?;
        let count1 = self.marker_count(oriented1).ok_or(Error::DataIntegrity(format!(
            "No markers stored for oriented read {}", oriented1
        )))?;

        let alignment = Alignment::new(ordinals);
        alignment.check_strictly_increasing()?;
        alignment.check_ordinal_ranges(count0 as u32, count1 as u32)?;

        let record = AlignmentRecord {
            read_ids: [read0, read1],
            is_same_strand,
            marker_count: alignment.len() as u32,
        };
        let id = self.alignments.len() as u32;
        self.alignments.push((record, alignment));
        Ok(id)
    }

    // Checks that every read has both orientations with the same marker count.
    fn sanity_checks(&self) -> Result<()> {
        for oriented_value in self.markers.keys() {
            let oriented = OrientedReadId::from_value(*oriented_value);
            let other = oriented.reverse_complement();
            let other_count = self.marker_count(other).ok_or(Error::DataIntegrity(format!(
                "Oriented read {} has markers but {} does not", oriented, other
            )))?;
            if other_count != self.markers[oriented_value].len() {
                return Err(Error::DataIntegrity(format!(
                    "Marker counts differ between {} and {}", oriented, other
                )));
            }
        }
        Ok(())
    }
}

//-----------------------------------------------------------------------------

/// The read contract of the alignment store.
///
/// This structure wraps the prepared statements used by the analysis pipeline.
/// It borrows the database connection, and each mini-assembly invocation should
/// use its own interface.
#[derive(Debug)]
pub struct StoreInterface<'a> {
    get_markers: Statement<'a>,
    get_alignment_ids: Statement<'a>,
    get_record: Statement<'a>,
    get_payload: Statement<'a>,
}

impl<'a> StoreInterface<'a> {
    /// Returns a new interface to the given store.
    ///
    /// Passes through any database errors.
    pub fn new(database: &'a AlignmentBase) -> Result<Self> {
        let get_markers = database.connection.prepare(
            "SELECT marker_count, tokens FROM Markers WHERE oriented_read = ?1"
        )?;

        let get_alignment_ids = database.connection.prepare(
            "SELECT id FROM Alignments WHERE read0 = ?1 OR read1 = ?1 ORDER BY id"
        )?;

        let get_record = database.connection.prepare(
            "SELECT read0, read1, same_strand, marker_count FROM Alignments WHERE id = ?1"
        )?;

        let get_payload = database.connection.prepare(
            "SELECT payload FROM Alignments WHERE id = ?1"
        )?;

        Ok(StoreInterface {
            get_markers,
            get_alignment_ids,
            get_record, get_payload,
        })
    }

    /// Returns the number of markers in the given oriented read.
    ///
    /// Returns [`Error::DataIntegrity`] if the oriented read is not in the store.
    pub fn marker_count(&mut self, oriented_read: OrientedReadId) -> Result<usize> {
        let result: Option<usize> = self.get_markers.query_row(
            (oriented_read.value(),),
            |row| row.get(0)
        ).optional()?;
        result.ok_or(Error::DataIntegrity(format!(
            "No markers stored for oriented read {}", oriented_read
        )))
    }

    /// Returns the marker token sequence of the given oriented read.
    ///
    /// Returns [`Error::DataIntegrity`] if the oriented read is not in the store
    /// or the token blob does not decode to the stored marker count.
    pub fn marker_tokens(&mut self, oriented_read: OrientedReadId) -> Result<Vec<MarkerToken>> {
        let result: Option<(usize, Vec<u8>)> = self.get_markers.query_row(
            (oriented_read.value(),),
            |row| Ok((row.get(0)?, row.get(1)?))
        ).optional()?;
        let (marker_count, blob) = result.ok_or(Error::DataIntegrity(format!(
            "No markers stored for oriented read {}", oriented_read
        )))?;

        let tokens: Vec<MarkerToken> = VarintIter::new(&blob).collect();
        if tokens.len() != marker_count {
            return Err(Error::DataIntegrity(format!(
                "Oriented read {}: decoded {} marker tokens, expected {}",
                oriented_read, tokens.len(), marker_count
            )));
        }
        Ok(tokens)
    }

    /// Returns the identifiers of all stored alignments involving the given read.
    ///
    /// The identifiers are returned in increasing order.
    /// Alignments are stored per read pair; orientation handling is the
    /// responsibility of [`crate::canonical`].
    pub fn alignment_ids(&mut self, read_id: ReadId) -> Result<Vec<u32>> {
        let mut result = Vec::new();
        let mut rows = self.get_alignment_ids.query((read_id,))?;
        while let Some(row) = rows.next()? {
            result.push(row.get(0)?);
        }
        Ok(result)
    }

    /// Returns the summary record of the given alignment.
    ///
    /// Returns [`Error::DataIntegrity`] if the alignment does not exist.
    pub fn record(&mut self, alignment_id: u32) -> Result<AlignmentRecord> {
        let result: Option<AlignmentRecord> = self.get_record.query_row(
            (alignment_id,),
            |row| {
                let read0: ReadId = row.get(0)?;
                let read1: ReadId = row.get(1)?;
                let same_strand: i64 = row.get(2)?;
                let marker_count: u32 = row.get(3)?;
                Ok(AlignmentRecord {
                    read_ids: [read0, read1],
                    is_same_strand: same_strand != 0,
                    marker_count,
                })
            }
        ).optional()?;
        result.ok_or(Error::DataIntegrity(format!(
            "No stored alignment with id {}", alignment_id
        )))
    }

    /// Returns the compressed ordinal-pair payload of the given alignment.
    ///
    /// Returns [`Error::DataIntegrity`] if the alignment does not exist.
    /// See [`Alignment::decompress`] for decoding.
    pub fn payload(&mut self, alignment_id: u32) -> Result<Vec<u8>> {
        let result: Option<Vec<u8>> = self.get_payload.query_row(
            (alignment_id,),
            |row| row.get(0)
        ).optional()?;
        result.ok_or(Error::DataIntegrity(format!(
            "No stored alignment with id {}", alignment_id
        )))
    }
}

//-----------------------------------------------------------------------------
