//! One thunder job, start to finish.
//!
//! Hourly jobs wait for the members covering their window, then write the
//! 1-hour and (from hour 4) 4-hour products. Full-period jobs load whatever
//! members exist, read the windowed products back and walk the block hour
//! by hour, writing one full-period product per hour.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use aggregation::{
    calibration_hour, full_period_end, predictor_hours, remainder, thunder_job, to_percent,
    MonotonicClamp, ThunderJob, WindowedForecasts,
};
use anyhow::{anyhow, bail, Context, Result};
use calib_common::{thunder_output_name, AggregationWindow, Cycle, Field2D, GridCoords, Hazard};
use grib2_codec::GridCodec;
use grid_processor::{thunder_probability, GridMap, ThunderMember, ThunderProduct};
use ingestion::{
    thunder_members, ExpectedCounts, LoadedMember, MemberLoader, ReferenceGrid, Synchronizer,
    ThunderEnsemble,
};
use storage::{GridMapStore, Product, ProductWriter, TableStore};
use tracing::{debug, info, warn};

use crate::config::ThunderConfig;

/// GRIB2 master table version of the thunder products.
pub const THUNDER_TABLE_VERSION: u8 = 2;

/// Smoothing applied before the windowed corrections.
const WINDOW_SIGMA: f64 = 1.0;

/// Smoothing applied before the full-period corrections.
const FULL_PERIOD_SIGMA: f64 = 2.0;

/// What a finished job produced.
#[derive(Debug, Clone, Default)]
pub struct JobSummary {
    pub written: Vec<PathBuf>,
    /// Hours whose products already existed.
    pub skipped: Vec<u32>,
}

/// A thunder job for one cycle.
pub struct ThunderPipeline<C> {
    config: ThunderConfig,
    cycle: Cycle,
    job: ThunderJob,
    codec: Arc<C>,
    loader: MemberLoader<Arc<C>>,
}

impl<C: GridCodec> ThunderPipeline<C> {
    /// `job` is the operational job number: 1-48 for hourly jobs, 49 and up
    /// for full-period blocks.
    pub fn new(config: ThunderConfig, cycle: Cycle, job: u32, codec: C) -> Result<Self> {
        let job = thunder_job(cycle.hour, job)?;
        let codec = Arc::new(codec);
        Ok(Self {
            config,
            cycle,
            job,
            loader: MemberLoader::new(codec.clone()),
            codec,
        })
    }

    pub fn job(&self) -> &ThunderJob {
        &self.job
    }

    pub async fn run(&self) -> Result<JobSummary> {
        info!(cycle = %self.cycle, job = ?self.job, "Starting thunder calibration");
        let reference = self
            .loader
            .reference_grid(&self.config.reference_grid())
            .context("Failed to read the thunder reference grid")?;
        let writer = ProductWriter::new(
            self.codec.clone(),
            self.config.product_dir(),
            reference.template.clone(),
            THUNDER_TABLE_VERSION,
        );
        let mut tables = TableStore::new(self.config.table_dir(), false);

        let summary = match self.job.clone() {
            ThunderJob::Hour(fhour) => {
                self.run_hour(fhour, &reference, &writer, &mut tables).await?
            }
            ThunderJob::FullPeriod(hours) => {
                self.run_full_period(hours.collect(), &reference, &writer, &mut tables)?
            }
        };
        info!(
            cycle = %self.cycle,
            written = summary.written.len(),
            skipped = summary.skipped.len(),
            table_hits = tables.stats().hits,
            "Thunder calibration complete"
        );
        Ok(summary)
    }

    fn output_name(&self, window: AggregationWindow, fhour: u32) -> String {
        thunder_output_name(self.cycle.hour, window, fhour)
    }

    /// A windowed product ending at `fhour`.
    fn windowed_product(&self, window: AggregationWindow, fhour: u32, values: Field2D) -> Product {
        Product {
            name: self.output_name(window, fhour),
            parameter: Hazard::Thunder.grib_parameter(),
            forecast_time: fhour - window.hours(),
            end_time: self.cycle.valid_time(fhour),
            length: window.hours(),
            values,
        }
    }

    async fn run_hour(
        &self,
        fhour: u32,
        reference: &ReferenceGrid,
        writer: &ProductWriter<Arc<C>>,
        tables: &mut TableStore,
    ) -> Result<JobSummary> {
        let done = writer.exists(&self.output_name(AggregationWindow::OneHour, fhour))
            && (fhour < 4 || writer.exists(&self.output_name(AggregationWindow::FourHour, fhour)));
        if done {
            info!(forecast_hour = fhour, "Windowed products already exist, skipping");
            return Ok(JobSummary {
                written: Vec::new(),
                skipped: vec![fhour],
            });
        }

        let members = thunder_members(&self.cycle, &self.config.models, self.config.hiresw_core);
        let expected = ExpectedCounts::for_cycle(&self.cycle, self.config.hiresw_core);
        let mut ensemble = ThunderEnsemble::new(members, predictor_hours(fhour));
        let sync = Synchronizer::new(self.config.wait);
        ensemble
            .synchronize(&self.loader, &sync, expected.files(fhour))
            .await?;
        let members = self.predictor_members(ensemble.into_members(), &reference.coords)?;

        let target = reference.coords.shape();
        let valid_hour = calibration_hour(&self.cycle, fhour);
        let mut products = Vec::with_capacity(2);

        let one_hour = thunder_probability(&members, ThunderProduct::OneHour, fhour - 1, target)?;
        let one_hour = tables
            .correction("grid1hr", self.cycle.hour, valid_hour)?
            .apply(&one_hour, WINDOW_SIGMA)?;
        products.push(self.windowed_product(AggregationWindow::OneHour, fhour, to_percent(&one_hour)));

        if fhour >= 4 {
            let four_hour =
                thunder_probability(&members, ThunderProduct::FourHour, fhour - 4, target)?;
            let four_hour = tables
                .correction("grid", self.cycle.hour, valid_hour)?
                .apply(&four_hour, WINDOW_SIGMA)?;
            products.push(self.windowed_product(
                AggregationWindow::FourHour,
                fhour,
                to_percent(&four_hour),
            ));
        }

        let written = writer.write_all(self.cycle.reference_time(), &products)?;
        Ok(JobSummary {
            written,
            skipped: Vec::new(),
        })
    }

    fn run_full_period(
        &self,
        fhours: Vec<u32>,
        reference: &ReferenceGrid,
        writer: &ProductWriter<Arc<C>>,
        tables: &mut TableStore,
    ) -> Result<JobSummary> {
        let (first, last) = match (fhours.first(), fhours.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => bail!("Empty full-period block"),
        };

        // The hourly jobs are done by now; take whatever exists.
        let members = thunder_members(&self.cycle, &self.config.models, self.config.hiresw_core);
        let mut ensemble = ThunderEnsemble::new(members, first..=last);
        let missing = ensemble.load_available(&self.loader)?;
        if !missing.is_empty() {
            debug!(missing = missing.len(), "Member files absent for the full period");
        }
        let loaded = ensemble.loaded_members();
        if loaded < self.config.min_members {
            bail!(
                "Not enough HREF members for the full period: {} loaded, {} required",
                loaded,
                self.config.min_members
            );
        }
        let members = self.predictor_members(ensemble.into_members(), &reference.coords)?;
        let windowed = self.windowed_forecasts(&fhours, writer)?;

        let target = reference.coords.shape();
        let mut clamp = MonotonicClamp::new();
        let mut summary = JobSummary::default();

        for &fhour in &fhours[..fhours.len() - 1] {
            let hours = remainder(self.cycle.hour, fhour);
            let name = self.output_name(AggregationWindow::FullPeriod { hours }, fhour);
            if let Some(previous) = writer.read(&name)? {
                info!(forecast_hour = fhour, "Full-period product exists, resuming from it");
                clamp.resume(previous);
                summary.skipped.push(fhour);
                continue;
            }

            let raw =
                thunder_probability(&members, ThunderProduct::FullPeriod { hours }, fhour, target)?;
            let calibrated = tables
                .correction("fullperiod", self.cycle.hour, calibration_hour(&self.cycle, fhour))?
                .apply(&raw, FULL_PERIOD_SIGMA)?;
            let mut forecast = to_percent(&calibrated);
            match windowed.max_hour(fhour, hours)? {
                Some(floor) => forecast = forecast.max_with(&floor)?,
                None => warn!(
                    forecast_hour = fhour,
                    remainder = hours,
                    "No windowed forecasts to floor the full period"
                ),
            }
            let forecast = clamp.apply(forecast, hours)?;

            let product = Product {
                name,
                parameter: Hazard::Thunder.grib_parameter(),
                forecast_time: fhour,
                end_time: full_period_end(&self.cycle, fhour),
                length: hours,
                values: forecast,
            };
            summary
                .written
                .extend(writer.write_all(self.cycle.reference_time(), &[product])?);
            debug!(forecast_hour = fhour, remainder = hours, "Full-period forecast complete");
        }
        Ok(summary)
    }

    /// 4-hour products ending 4 hours after each block hour but the last
    /// four, and 1-hour products ending at the last three block hours.
    fn windowed_forecasts(
        &self,
        fhours: &[u32],
        writer: &ProductWriter<Arc<C>>,
    ) -> Result<WindowedForecasts> {
        let mut windowed = WindowedForecasts::new();
        let four_hour_starts = fhours.len().saturating_sub(4);
        let mut read = |window: AggregationWindow, end: u32| -> Result<()> {
            let name = self.output_name(window, end);
            match writer.read(&name)? {
                Some(field) => windowed.insert(window, end, field),
                None => warn!(product = %name, "Windowed product is not available"),
            }
            Ok(())
        };
        for &fhour in &fhours[..four_hour_starts] {
            read(AggregationWindow::FourHour, fhour + 4)?;
        }
        for &fhour in &fhours[fhours.len().saturating_sub(3)..] {
            read(AggregationWindow::OneHour, fhour)?;
        }
        debug!(loaded = windowed.len(), "Read windowed products");
        Ok(windowed)
    }

    /// Attach a 40 km grid map to every loaded member. Members sharing a
    /// native grid share one map.
    fn predictor_members(
        &self,
        loaded: Vec<LoadedMember>,
        target: &GridCoords,
    ) -> Result<Vec<ThunderMember>> {
        let store = GridMapStore::new(&self.config.map_dir);
        let mut maps: HashMap<(usize, usize), Arc<GridMap>> = HashMap::new();
        let mut members = Vec::with_capacity(loaded.len());
        for member in loaded {
            let shape = member.coords.shape();
            let map = match maps.get(&shape) {
                Some(map) => map.clone(),
                None => {
                    let name = format!(
                        "max_{}x{}_to_{}x{}",
                        shape.0,
                        shape.1,
                        target.ny(),
                        target.nx()
                    );
                    let map: GridMap =
                        store.load_or_build(&name, || GridMap::compute(&member.coords, target))?;
                    let map = Arc::new(map);
                    maps.insert(shape, map.clone());
                    map
                }
            };
            let mut predictors =
                ThunderMember::new(member.descriptor.name.clone(), member.descriptor.lag_hours, map);
            for (hour, fields) in member.hours {
                predictors.insert_hour(hour, fields);
            }
            members.push(predictors);
        }
        if members.is_empty() {
            return Err(anyhow!("No thunder members loaded"));
        }
        Ok(members)
    }
}
