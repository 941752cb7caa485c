//! One severe job, start to finish.
//!
//! ```text
//! SREF gdlist ─────────────────────────────┐
//!                                          ▼
//! HREF members ─> masks ─> 4 h max ─> nprob ─> hourly tables ─> 4hr products
//!                           (cached per hour)        │
//!                                                    └─> accumulator ─> 24hr products
//! ```
//!
//! An hourly job computes (or reads from the cache) one neighborhood field
//! and writes the three 4-hour products. The full-period job reads the
//! consolidated cache, calibrates every hour of the day and folds them into
//! the day products.

use std::path::PathBuf;
use std::sync::Arc;

use aggregation::{window_for, CycleWindow, HazardAccumulator, HourLifecycle, SevereJob};
use anyhow::{anyhow, Context, Result};
use calib_common::{
    severe_output_name, valid_time_key, AggregationWindow, Cycle, Field2D, Hazard, SEVERE_HAZARDS,
};
use calibration::{sref_variables, BinScheme, SrefPredictors};
use grib2_codec::GridCodec;
use grid_processor::{NearestInterpolator, NeighborhoodProbability, RollingMax};
use ingestion::{severe_members, MemberLoader, ReferenceGrid, SevereEnsemble, SrefRequest, Synchronizer};
use storage::{GridMapStore, ProbabilityCache, ProbabilityFields, Product, ProductWriter, TableStore};
use tracing::{debug, info};

use crate::config::SevereConfig;

/// GRIB2 master table version of the severe products.
pub const SEVERE_TABLE_VERSION: u8 = 1;

/// What a finished job produced.
#[derive(Debug, Clone, Default)]
pub struct JobSummary {
    pub products: Vec<PathBuf>,
    /// Neighborhood probabilities came from the cache.
    pub from_cache: bool,
    /// Calibrated valid hours.
    pub hours: usize,
}

/// A severe job for one cycle.
pub struct SeverePipeline<C> {
    config: SevereConfig,
    cycle: Cycle,
    job: SevereJob,
    window: CycleWindow,
    codec: Arc<C>,
    loader: MemberLoader<Arc<C>>,
}

impl<C: GridCodec> SeverePipeline<C> {
    pub fn new(config: SevereConfig, cycle: Cycle, job: SevereJob, codec: C) -> Result<Self> {
        let window = window_for(cycle.hour, job)?;
        let codec = Arc::new(codec);
        Ok(Self {
            config,
            cycle,
            job,
            window,
            loader: MemberLoader::new(codec.clone()),
            codec,
        })
    }

    pub fn window(&self) -> &CycleWindow {
        &self.window
    }

    pub async fn run(&self) -> Result<JobSummary> {
        info!(
            cycle = %self.cycle,
            job = %self.job,
            href_run = self.window.href_run,
            sref_hours = ?self.window.sref_hours,
            "Starting severe calibration"
        );
        let reference = self
            .loader
            .reference_grid(&self.config.reference_grid())
            .context("Failed to read the SREF reference grid")?;
        let predictors = self.sref_predictors().await?;
        let (fields, from_cache) = self.neighborhood_fields(&reference).await?;

        let keys: Vec<String> = (0..self.window.window_count())
            .map(|i| valid_time_key(self.window.valid_time(&self.cycle, i)))
            .collect();
        let mut lifecycle = HourLifecycle::new(keys.iter().cloned());
        let mut tables = TableStore::new(self.config.table_dir(), self.config.capped);
        let writer = ProductWriter::new(
            self.codec.clone(),
            self.config.product_dir(),
            reference.template.clone(),
            SEVERE_TABLE_VERSION,
        );

        let mut accumulators: Vec<HazardAccumulator> =
            SEVERE_HAZARDS.iter().map(|h| HazardAccumulator::new(*h)).collect();
        let mut products = Vec::new();

        for (index, key) in keys.iter().enumerate() {
            let sref_hour = self.window.sref_hours.start() + index as u32;
            let probability = fields
                .get(key)
                .ok_or_else(|| anyhow!("No neighborhood probabilities cached for {}", key))?;
            lifecycle.cache(key)?;

            let calibrated = calibrate_hour(&mut tables, &predictors, self.cycle.hour, sref_hour, probability)
                .with_context(|| format!("Failed to calibrate valid time {}", key))?;
            debug!(valid_time = %key, sref_hour, "Calibrated hour");

            match self.job {
                SevereJob::Hour(_) => {
                    let output_hour = self.window.output_hour(sref_hour);
                    let end_time = self.window.valid_time(&self.cycle, index);
                    for (hazard, values) in calibrated {
                        products.push(Product {
                            name: severe_output_name(
                                self.cycle.hour,
                                hazard,
                                AggregationWindow::FourHour,
                                output_hour,
                            ),
                            parameter: hazard.grib_parameter(),
                            forecast_time: output_hour.saturating_sub(4),
                            end_time,
                            length: 4,
                            values,
                        });
                    }
                }
                SevereJob::FullPeriod => {
                    for (acc, (_, values)) in accumulators.iter_mut().zip(calibrated) {
                        acc.push(values)?;
                    }
                }
            }
        }

        if self.job == SevereJob::FullPeriod {
            products = self.day_products(&mut tables, &accumulators)?;
        }

        let written = writer.write_all(self.cycle.reference_time(), &products)?;
        for key in &keys {
            lifecycle.emit(key)?;
        }
        info!(
            cycle = %self.cycle,
            job = %self.job,
            products = written.len(),
            from_cache,
            table_hits = tables.stats().hits,
            "Severe calibration complete"
        );
        Ok(JobSummary {
            products: written,
            from_cache,
            hours: keys.len(),
        })
    }

    async fn sref_predictors(&self) -> Result<SrefPredictors> {
        let mut variables: Vec<&str> = SEVERE_HAZARDS
            .iter()
            .flat_map(|h| sref_variables(*h).iter().copied())
            .collect();
        variables.sort_unstable();
        variables.dedup();

        let request = SrefRequest::new(
            &self.config.sref_dir,
            self.window.sref_cycle(&self.cycle),
            self.window.extraction_hours(),
            variables,
            self.config.job_dir(&self.job.to_string()),
        );
        let sync = Synchronizer::new(self.config.sref_wait);
        request
            .extract(&sync, &self.config.gempak_dir)
            .await
            .context("SREF extraction failed")
    }

    /// Probabilities keyed by valid time, and whether they came from the
    /// cache.
    async fn neighborhood_fields(&self, reference: &ReferenceGrid) -> Result<(ProbabilityFields, bool)> {
        let href_cycle = self.window.href_cycle(&self.cycle);
        let cache = ProbabilityCache::new(&self.config.cache_dir);

        let fhour = match self.job {
            SevereJob::FullPeriod => {
                let fields = cache
                    .consolidate(&self.cycle, &href_cycle, self.window.cache_hours.clone())
                    .context("Hourly neighborhood caches are incomplete")?;
                return Ok((fields, true));
            }
            SevereJob::Hour(fhour) => fhour,
        };

        if cache.has_hour(&href_cycle, fhour) {
            info!(href_cycle = %href_cycle, forecast_hour = fhour, "Using cached neighborhood probabilities");
            return Ok((cache.load_hour(&href_cycle, fhour)?, true));
        }

        let field = self.compute_neighborhood(&href_cycle, reference).await?;
        let mut fields = ProbabilityFields::new();
        fields.insert(valid_time_key(href_cycle.valid_time(fhour)), field);
        cache.save_hour(&href_cycle, fhour, &fields)?;
        Ok((fields, false))
    }

    /// Wait for the HREF members, then turn their 4-hour maximum masks into
    /// one probability field on the reference grid.
    async fn compute_neighborhood(&self, href_cycle: &Cycle, reference: &ReferenceGrid) -> Result<Field2D> {
        let members = severe_members(href_cycle, &self.config.models, self.config.hiresw_core);
        let reference_dx = members
            .first()
            .map(|m| m.dx_km)
            .ok_or_else(|| anyhow!("No severe members configured"))?;

        let mut ensemble = SevereEnsemble::new(members, self.window.href_hours.clone());
        let sync = Synchronizer::new(self.config.href_wait);
        ensemble.synchronize(&self.loader, &sync).await?;

        let native = ensemble
            .coords()
            .cloned()
            .ok_or_else(|| anyhow!("Severe ensemble loaded no grids"))?;
        let target = &reference.coords;
        let name = format!(
            "nearest_{}x{}_to_{}x{}",
            native.ny(),
            native.nx(),
            target.ny(),
            target.nx()
        );
        let regrid: NearestInterpolator = GridMapStore::new(self.config.map_dir())
            .load_or_build(&name, || NearestInterpolator::compute(&native, target))?;

        let rolled = (0..ensemble.members().len())
            .map(|member| {
                let mut rolling = RollingMax::default();
                let mut latest = None;
                for mask in ensemble.member_masks(member) {
                    latest = Some(rolling.push(mask.clone())?);
                }
                latest.ok_or_else(|| anyhow!("Member {} has no masks", member))
            })
            .collect::<Result<Vec<Field2D>>>()?;

        let engine = NeighborhoodProbability::for_reference_spacing(reference_dx, regrid);
        let field = engine.compute(&rolled)?;
        info!(
            members = rolled.len(),
            sigma = engine.sigma(),
            peak = field.max_value().unwrap_or(0.0),
            "Computed neighborhood probabilities"
        );
        Ok(field)
    }

    fn day_products(&self, tables: &mut TableStore, accumulators: &[HazardAccumulator]) -> Result<Vec<Product>> {
        let period = self.window.period;
        let output_hour = self.window.day_output_hour();
        accumulators
            .iter()
            .map(|acc| {
                let hazard = acc.hazard();
                let table = tables.day(hazard, self.cycle.hour)?;
                let values = acc.full_period(&table)?;
                Ok(Product {
                    name: severe_output_name(
                        self.cycle.hour,
                        hazard,
                        AggregationWindow::Day { hours: period },
                        output_hour,
                    ),
                    parameter: hazard.grib_parameter(),
                    forecast_time: output_hour.saturating_sub(period),
                    end_time: self.window.day_end(&self.cycle),
                    length: period,
                    values,
                })
            })
            .collect()
    }
}

/// Calibrated 4-hour probability of every severe hazard for the window
/// ending at SREF hour `sref_hour`.
pub fn calibrate_hour(
    tables: &mut TableStore,
    predictors: &SrefPredictors,
    cycle_hour: u32,
    sref_hour: u32,
    probability: &Field2D,
) -> Result<Vec<(Hazard, Field2D)>> {
    SEVERE_HAZARDS
        .iter()
        .map(|&hazard| {
            let table = tables.hourly(hazard, cycle_hour, sref_hour)?;
            let predictor = predictors.predictor(hazard, sref_hour)?;
            let values = table.apply(probability, &predictor, BinScheme::Hourly)?;
            Ok((hazard, values))
        })
        .collect()
}
