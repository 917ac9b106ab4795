//! Configured encoder/decoder
//!
//! [`Codec`] bundles everything derived from one `(technique, k, m, w)` choice so
//! the coding matrix, bitmatrix and schedules are built once and reused across
//! calls.
//!
//! ```
//! use erasure_coder::{CodeTechnique, CodecBuilder};
//!
//! let codec = CodecBuilder::new()
//!     .technique(CodeTechnique::CauchyGood)
//!     .k(4)
//!     .m(2)
//!     .w(8)
//!     .build()
//!     .unwrap();
//!
//! let data = vec![vec![1u8; 64]; 4];
//! let data: Vec<&[u8]> = data.iter().map(Vec::as_slice).collect();
//! let mut coding = vec![vec![0u8; 64]; 2];
//! let mut coding: Vec<&mut [u8]> = coding.iter_mut().map(Vec::as_mut_slice).collect();
//! codec.encode(&data, &mut coding).unwrap();
//! ```

use crate::bitmatrix::{matrix_to_bitmatrix, BitMatrix};
use crate::codes::CodeTechnique;
use crate::engine;
use crate::error::{CodingError, Result};
use crate::galois::{FieldRegistry, FieldService, MAX_W};
use crate::matrix::Matrix;
use crate::schedule::{compile_schedule, Schedule, ScheduleCache};
use log::debug;
use std::fmt;
use std::sync::Arc;

/// How encode and decode touch the unit buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodingMode {
    /// GF(2^w) region multiplies, `w` in {8, 16, 32}
    Matrix,
    /// XOR dot products straight from the bitmatrix
    Bitmatrix,
    /// Precompiled copy/XOR schedules
    Schedule,
}

impl fmt::Display for CodingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CodingMode::Matrix => "matrix",
            CodingMode::Bitmatrix => "bitmatrix",
            CodingMode::Schedule => "schedule",
        })
    }
}

/// Coding parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodingConfig {
    /// Data units
    pub k: usize,
    /// Coding units
    pub m: usize,
    /// Word size in bits
    pub w: u32,
    /// Bytes per packet in bitmatrix and schedule modes
    pub packetsize: usize,
    pub technique: CodeTechnique,
    /// `None` picks [`CodingConfig::effective_mode`]'s default
    pub mode: Option<CodingMode>,
    /// Compile schedules with the smart compiler
    pub smart: bool,
    /// Precompile every decode schedule (`m = 2`, schedule mode only)
    pub use_cache: bool,
}

impl Default for CodingConfig {
    fn default() -> Self {
        Self {
            k: 4,
            m: 2,
            w: 8,
            packetsize: 1024,
            technique: CodeTechnique::ReedSolVandermonde,
            mode: None,
            smart: true,
            use_cache: false,
        }
    }
}

impl CodingConfig {
    pub fn new(technique: CodeTechnique, k: usize, m: usize, w: u32) -> Self {
        Self {
            k,
            m,
            w,
            technique,
            ..Self::default()
        }
    }

    /// Mode used when none was chosen explicitly
    pub fn effective_mode(&self) -> CodingMode {
        match self.mode {
            Some(mode) => mode,
            None if self.technique.supports_matrix() && matches!(self.w, 8 | 16 | 32) => {
                CodingMode::Matrix
            }
            None => CodingMode::Schedule,
        }
    }

    /// Check the parameters fit together, without building anything
    pub fn validate(&self) -> Result<()> {
        if self.k == 0 || self.m == 0 {
            return Err(CodingError::BadParameters(format!(
                "k and m must be positive, got k={} m={}",
                self.k, self.m
            )));
        }
        if self.w == 0 {
            return Err(CodingError::BadParameters("w must be positive".to_string()));
        }
        if self.technique.supports_matrix() && self.w > MAX_W {
            return Err(CodingError::UnsupportedWordSize(self.w));
        }
        if let Some(fixed) = self.technique.fixed_m() {
            if fixed != self.m {
                return Err(CodingError::BadParameters(format!(
                    "{} needs m={fixed}, got m={}",
                    self.technique, self.m
                )));
            }
        }

        let mode = self.effective_mode();
        if mode == CodingMode::Matrix {
            if !self.technique.supports_matrix() {
                return Err(CodingError::UnsupportedConfiguration(format!(
                    "{} has no matrix mode",
                    self.technique
                )));
            }
            if !matches!(self.w, 8 | 16 | 32) {
                return Err(CodingError::BadParameters(format!(
                    "matrix mode needs w in {{8, 16, 32}}, got w={}",
                    self.w
                )));
            }
        } else if self.packetsize == 0 || self.packetsize % 8 != 0 {
            return Err(CodingError::Alignment {
                what: "packetsize",
                size: self.packetsize,
                multiple: 8,
            });
        }

        if self.use_cache && (mode != CodingMode::Schedule || self.m != 2) {
            return Err(CodingError::UnsupportedConfiguration(format!(
                "schedule cache needs schedule mode and m=2, got {mode} mode and m={}",
                self.m
            )));
        }
        Ok(())
    }
}

/// Encoder/decoder for one coding configuration
pub struct Codec {
    config: CodingConfig,
    mode: CodingMode,
    row_k_ones: bool,
    registry: Arc<FieldRegistry>,
    field: Option<Arc<dyn FieldService>>,
    matrix: Option<Matrix>,
    bitmatrix: Option<BitMatrix>,
    encode_schedule: Option<Schedule>,
    cache: Option<ScheduleCache>,
}

impl Codec {
    /// Build the matrices and schedules `config` needs
    pub fn new(config: CodingConfig, registry: Arc<FieldRegistry>) -> Result<Self> {
        config.validate()?;
        let mode = config.effective_mode();
        let CodingConfig { k, m, w, .. } = config;

        let (field, matrix) = if config.technique.supports_matrix() {
            let field = registry.field(w)?;
            let matrix = config.technique.build_matrix(k, m, field.as_ref())?;
            (Some(field), Some(matrix))
        } else {
            (None, None)
        };

        // XOR-only codes are always built with a parity block first
        let row_k_ones = config.technique.row_k_ones()
            && matrix
                .as_ref()
                .map_or(true, |matrix| matrix.row(0).iter().all(|&v| v == 1));

        let bitmatrix = match (mode, &matrix, &field) {
            (CodingMode::Matrix, _, _) => None,
            (_, Some(matrix), Some(field)) => Some(matrix_to_bitmatrix(matrix, field.as_ref())?),
            _ => Some(config.technique.build_bitmatrix(k, m, w, &registry)?),
        };

        let (encode_schedule, cache) = match (&bitmatrix, mode) {
            (Some(bitmatrix), CodingMode::Schedule) if config.use_cache => {
                let cache = ScheduleCache::generate(k, w as usize, bitmatrix, config.smart)?;
                (None, Some(cache))
            }
            (Some(bitmatrix), CodingMode::Schedule) => {
                let schedule = compile_schedule(k, w as usize, bitmatrix, config.smart)?;
                (Some(schedule), None)
            }
            _ => (None, None),
        };

        debug!(
            "Built {} codec k={k} m={m} w={w} in {mode} mode{}",
            config.technique,
            if cache.is_some() { " with schedule cache" } else { "" }
        );

        Ok(Self {
            config,
            mode,
            row_k_ones,
            registry,
            field,
            matrix,
            bitmatrix,
            encode_schedule,
            cache,
        })
    }

    pub fn config(&self) -> &CodingConfig {
        &self.config
    }

    pub fn mode(&self) -> CodingMode {
        self.mode
    }

    /// Whether decode may rebuild a data unit from the parity unit
    pub fn row_k_ones(&self) -> bool {
        self.row_k_ones
    }

    pub fn registry(&self) -> &Arc<FieldRegistry> {
        &self.registry
    }

    /// GF(2^w) coding matrix, absent for XOR-only codes
    pub fn matrix(&self) -> Option<&Matrix> {
        self.matrix.as_ref()
    }

    /// Coding bitmatrix, built in bitmatrix and schedule modes
    pub fn bitmatrix(&self) -> Option<&BitMatrix> {
        self.bitmatrix.as_ref()
    }

    pub fn encode_schedule(&self) -> Option<&Schedule> {
        self.cache
            .as_ref()
            .map(ScheduleCache::encode_schedule)
            .or(self.encode_schedule.as_ref())
    }

    pub fn schedule_cache(&self) -> Option<&ScheduleCache> {
        self.cache.as_ref()
    }

    fn missing(what: &str) -> CodingError {
        CodingError::UnsupportedConfiguration(format!("codec was built without a {what}"))
    }

    fn scalar_parts(&self) -> Result<(&Matrix, &dyn FieldService)> {
        match (&self.matrix, &self.field) {
            (Some(matrix), Some(field)) => Ok((matrix, field.as_ref())),
            _ => Err(Self::missing("coding matrix")),
        }
    }

    fn bitmatrix_or_err(&self) -> Result<&BitMatrix> {
        self.bitmatrix.as_ref().ok_or_else(|| Self::missing("bitmatrix"))
    }

    /// Fill `coding` from `data`
    pub fn encode(&self, data: &[&[u8]], coding: &mut [&mut [u8]]) -> Result<()> {
        let CodingConfig { k, w, packetsize, .. } = self.config;
        match self.mode {
            CodingMode::Matrix => {
                let (matrix, field) = self.scalar_parts()?;
                engine::matrix_encode(matrix, field, data, coding)
            }
            CodingMode::Bitmatrix => {
                engine::bitmatrix_encode(self.bitmatrix_or_err()?, w as usize, data, coding, packetsize)
            }
            CodingMode::Schedule => {
                let schedule = self
                    .encode_schedule()
                    .ok_or_else(|| Self::missing("encode schedule"))?;
                engine::schedule_encode(k, w as usize, schedule, data, coding, packetsize)
            }
        }
    }

    /// Rebuild the units listed in `erasures` in place
    pub fn decode(
        &self,
        erasures: &[usize],
        data: &mut [&mut [u8]],
        coding: &mut [&mut [u8]],
    ) -> Result<()> {
        let CodingConfig {
            k,
            w,
            packetsize,
            smart,
            ..
        } = self.config;
        match self.mode {
            CodingMode::Matrix => {
                let (matrix, field) = self.scalar_parts()?;
                engine::matrix_decode(matrix, field, self.row_k_ones, erasures, data, coding)
            }
            CodingMode::Bitmatrix => engine::bitmatrix_decode(
                self.bitmatrix_or_err()?,
                w as usize,
                self.row_k_ones,
                erasures,
                data,
                coding,
                packetsize,
            ),
            CodingMode::Schedule => match &self.cache {
                Some(cache) => engine::schedule_decode_cache(cache, erasures, data, coding, packetsize),
                None => engine::schedule_decode_lazy(
                    k,
                    w as usize,
                    self.bitmatrix_or_err()?,
                    erasures,
                    data,
                    coding,
                    packetsize,
                    smart,
                ),
            },
        }
    }
}

impl fmt::Debug for Codec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Codec")
            .field("config", &self.config)
            .field("mode", &self.mode)
            .field("row_k_ones", &self.row_k_ones)
            .field("matrix", &self.matrix)
            .field("bitmatrix_ones", &self.bitmatrix.as_ref().map(BitMatrix::ones))
            .field("schedule_cache", &self.cache.as_ref().map(ScheduleCache::len))
            .finish()
    }
}

/// Builder for [`Codec`]
///
/// `technique` and `k` are required. `m` defaults to the technique's fixed value
/// when it has one; everything else falls back to [`CodingConfig::default`].
pub struct CodecBuilder {
    technique: Option<CodeTechnique>,
    k: Option<usize>,
    m: Option<usize>,
    w: Option<u32>,
    packetsize: Option<usize>,
    mode: Option<CodingMode>,
    smart: Option<bool>,
    use_cache: Option<bool>,
    registry: Option<Arc<FieldRegistry>>,
}

impl CodecBuilder {
    pub fn new() -> Self {
        Self {
            technique: None,
            k: None,
            m: None,
            w: None,
            packetsize: None,
            mode: None,
            smart: None,
            use_cache: None,
            registry: None,
        }
    }

    /// Start from an existing configuration
    pub fn from_config(config: CodingConfig) -> Self {
        Self {
            technique: Some(config.technique),
            k: Some(config.k),
            m: Some(config.m),
            w: Some(config.w),
            packetsize: Some(config.packetsize),
            mode: config.mode,
            smart: Some(config.smart),
            use_cache: Some(config.use_cache),
            registry: None,
        }
    }

    pub fn technique(mut self, technique: CodeTechnique) -> Self {
        self.technique = Some(technique);
        self
    }

    pub fn k(mut self, k: usize) -> Self {
        self.k = Some(k);
        self
    }

    pub fn m(mut self, m: usize) -> Self {
        self.m = Some(m);
        self
    }

    pub fn w(mut self, w: u32) -> Self {
        self.w = Some(w);
        self
    }

    pub fn packetsize(mut self, packetsize: usize) -> Self {
        self.packetsize = Some(packetsize);
        self
    }

    pub fn mode(mut self, mode: CodingMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn smart(mut self, smart: bool) -> Self {
        self.smart = Some(smart);
        self
    }

    pub fn use_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = Some(use_cache);
        self
    }

    /// Share field instances with other codecs
    pub fn registry(mut self, registry: Arc<FieldRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Resolved configuration, without building
    pub fn config(&self) -> Result<CodingConfig> {
        let technique = self
            .technique
            .ok_or_else(|| CodingError::BadParameters("no coding technique provided".to_string()))?;
        let k = self
            .k
            .ok_or_else(|| CodingError::BadParameters("no data unit count provided".to_string()))?;
        let m = self.m.or(technique.fixed_m()).ok_or_else(|| {
            CodingError::BadParameters("no coding unit count provided".to_string())
        })?;

        let defaults = CodingConfig::default();
        Ok(CodingConfig {
            k,
            m,
            w: self.w.unwrap_or(defaults.w),
            packetsize: self.packetsize.unwrap_or(defaults.packetsize),
            technique,
            mode: self.mode,
            smart: self.smart.unwrap_or(defaults.smart),
            use_cache: self.use_cache.unwrap_or(defaults.use_cache),
        })
    }

    /// Build the codec
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - the technique or `k` (or `m`, for techniques without a fixed `m`) is missing
    /// - the parameters do not fit the technique or mode
    /// - the code cannot be constructed for these parameters
    pub fn build(self) -> Result<Codec> {
        let config = self.config()?;
        let registry = self.registry.unwrap_or_default();
        Codec::new(config, registry)
    }
}

impl Default for CodecBuilder {
    fn default() -> Self {
        Self::new()
    }
}
