//! Reference stroke data: the provider contract, the on-disk loader and the
//! per-character cache.

use std::{
    collections::HashMap,
    io::ErrorKind,
    path::{Path, PathBuf},
    rc::Rc,
};

use serde::Deserialize;
use thiserror::Error;

use crate::geometry::{Point, path_length};

/// Baseline of the y-up median layout, flipped so that y grows downwards.
const MEDIAN_BASELINE: f64 = 900.0;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("no stroke data for {character:?}")]
    NotFound { character: String },
    #[error("stroke data for {character:?} is malformed: {reason}")]
    Malformed { character: String, reason: String },
    #[error("could not read stroke data for {character:?}")]
    Io {
        character: String,
        #[source]
        source: std::io::Error,
    },
}

/// Stroke geometry for one character, in stroke order.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceCharacter {
    pub character: String,
    pub strokes: Vec<Vec<Point>>,
    /// Canonical reading, when the data source knows it.
    pub pinyin: Option<String>,
}

impl ReferenceCharacter {
    /// Validates raw strokes; every stroke needs at least two distinct points.
    pub fn new(
        character: impl Into<String>,
        strokes: Vec<Vec<Point>>,
        pinyin: Option<String>,
    ) -> Result<Self, DataError> {
        let character = character.into();
        if strokes.is_empty() {
            return Err(DataError::Malformed {
                character,
                reason: "no strokes".into(),
            });
        }
        if let Some(idx) = strokes
            .iter()
            .position(|s| s.len() < 2 || path_length(s) <= 0.0)
        {
            return Err(DataError::Malformed {
                character,
                reason: format!("stroke {idx} has no length"),
            });
        }
        Ok(Self {
            character,
            strokes,
            pinyin,
        })
    }

    pub fn stroke_count(&self) -> usize {
        self.strokes.len()
    }
}

/// Anything that can hand out reference data by character.
pub trait CharacterSource {
    fn load(&self, character: &str) -> Result<ReferenceCharacter, DataError>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawPoint {
    Object { x: f64, y: f64 },
    Pair([f64; 2]),
}

impl From<RawPoint> for Point {
    fn from(raw: RawPoint) -> Self {
        match raw {
            RawPoint::Object { x, y } => Point::new(x, y),
            RawPoint::Pair([x, y]) => Point::new(x, y),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawStroke {
    Points(Vec<RawPoint>),
    Outline(serde::de::IgnoredAny),
}

#[derive(Deserialize)]
struct RawCharacter {
    #[serde(default)]
    strokes: Vec<RawStroke>,
    #[serde(default)]
    medians: Option<Vec<Vec<[f64; 2]>>>,
    #[serde(default)]
    pinyin: Option<String>,
}

/// Parses one character file. Medians win over point strokes when both exist.
pub fn parse_character(character: &str, json: &str) -> Result<ReferenceCharacter, DataError> {
    let raw: RawCharacter = serde_json::from_str(json).map_err(|e| DataError::Malformed {
        character: character.to_string(),
        reason: e.to_string(),
    })?;

    let strokes = match raw.medians {
        Some(medians) => medians
            .into_iter()
            .map(|m| {
                m.into_iter()
                    .map(|[x, y]| Point::new(x, MEDIAN_BASELINE - y))
                    .collect()
            })
            .collect(),
        None => raw
            .strokes
            .into_iter()
            .map(|s| match s {
                RawStroke::Points(points) => Ok(points.into_iter().map(Point::from).collect()),
                RawStroke::Outline(_) => Err(DataError::Malformed {
                    character: character.to_string(),
                    reason: "outline strokes without medians".into(),
                }),
            })
            .collect::<Result<Vec<Vec<Point>>, _>>()?,
    };
    ReferenceCharacter::new(character, strokes, raw.pinyin)
}

/// Reads `<character>.json` files out of one directory.
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl CharacterSource for DirectorySource {
    fn load(&self, character: &str) -> Result<ReferenceCharacter, DataError> {
        let path = self.root.join(format!("{character}.json"));
        let json = std::fs::read_to_string(&path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => DataError::NotFound {
                character: character.to_string(),
            },
            _ => DataError::Io {
                character: character.to_string(),
                source,
            },
        })?;
        log::debug!("loaded stroke data from {}", path.display());
        parse_character(character, &json)
    }
}

/// Identifies one outstanding load. Only the most recent ticket is honoured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    generation: u64,
    character: String,
}

impl LoadTicket {
    pub fn character(&self) -> &str {
        &self.character
    }
}

/// Loaded characters, shared read-only between attempts.
#[derive(Default)]
pub struct ReferenceCache {
    loaded: HashMap<String, Rc<ReferenceCharacter>>,
    generation: u64,
}

impl ReferenceCache {
    pub fn get(&self, character: &str) -> Option<Rc<ReferenceCharacter>> {
        self.loaded.get(character).cloned()
    }

    /// Starts a load, invalidating every ticket handed out before.
    pub fn begin(&mut self, character: &str) -> LoadTicket {
        self.generation += 1;
        LoadTicket {
            generation: self.generation,
            character: character.to_string(),
        }
    }

    pub fn is_current(&self, ticket: &LoadTicket) -> bool {
        ticket.generation == self.generation
    }

    /// Stores a finished load. Results for stale tickets are dropped and yield
    /// `Ok(None)`.
    pub fn finish(
        &mut self,
        ticket: &LoadTicket,
        result: Result<ReferenceCharacter, DataError>,
    ) -> Result<Option<Rc<ReferenceCharacter>>, DataError> {
        if !self.is_current(ticket) {
            log::warn!("dropping stale stroke data for {:?}", ticket.character);
            return Ok(None);
        }
        let data = Rc::new(result?);
        self.loaded.insert(ticket.character.clone(), data.clone());
        Ok(Some(data))
    }

    /// Cached data, or a synchronous load through `source`.
    pub fn fetch(
        &mut self,
        source: &dyn CharacterSource,
        character: &str,
    ) -> Result<Rc<ReferenceCharacter>, DataError> {
        self.begin(character);
        if let Some(hit) = self.get(character) {
            return Ok(hit);
        }
        let data = Rc::new(source.load(character)?);
        self.loaded.insert(character.to_string(), data.clone());
        Ok(data)
    }
}
