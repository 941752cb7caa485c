//! Synchronized ensembles for the severe and thunder products.
//!
//! The severe product needs every member hour; the thunder product goes
//! ahead once the loaded file count reaches its expected count. Both keep
//! what earlier passes loaded and only look for what is still missing.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::sync::Arc;

use calib_common::{Field2D, GridCoords};
use grib2_codec::GridCodec;
use grid_processor::PredictorHour;
use tracing::{info, warn};

use crate::error::{Result, SyncError};
use crate::loader::MemberLoader;
use crate::members::MemberDescriptor;
use crate::sync::{Readiness, SyncReport, Synchronizer};

/// Updraft-helicity masks for every (member, hour) of a severe job.
#[derive(Debug)]
pub struct SevereEnsemble {
    members: Vec<MemberDescriptor>,
    hours: Vec<u32>,
    /// Keyed by (hour, member index).
    masks: BTreeMap<(u32, usize), Field2D>,
    coords: Option<Arc<GridCoords>>,
}

impl SevereEnsemble {
    pub fn new(members: Vec<MemberDescriptor>, hours: RangeInclusive<u32>) -> Self {
        Self {
            members,
            hours: hours.collect(),
            masks: BTreeMap::new(),
            coords: None,
        }
    }

    pub fn members(&self) -> &[MemberDescriptor] {
        &self.members
    }

    pub fn hours(&self) -> &[u32] {
        &self.hours
    }

    /// Native grid of the first member loaded.
    pub fn coords(&self) -> Option<&Arc<GridCoords>> {
        self.coords.as_ref()
    }

    pub fn loaded(&self) -> usize {
        self.masks.len()
    }

    pub fn is_complete(&self) -> bool {
        self.masks.len() == self.members.len() * self.hours.len()
    }

    /// Masks of one member in hour order.
    pub fn member_masks(&self, member: usize) -> Vec<&Field2D> {
        self.hours
            .iter()
            .filter_map(|h| self.masks.get(&(*h, member)))
            .collect()
    }

    /// Load whatever has arrived, hour by hour and member by member.
    /// Returns the member files still missing.
    pub fn load_available<C: GridCodec>(&mut self, loader: &MemberLoader<C>) -> Result<Vec<String>> {
        let mut missing = Vec::new();
        for &hour in &self.hours {
            for (index, member) in self.members.iter().enumerate() {
                if self.masks.contains_key(&(hour, index)) {
                    continue;
                }
                match loader.uh_mask(member, hour)? {
                    Some(field) => {
                        match &self.coords {
                            Some(coords) if coords.shape() != field.coords.shape() => {
                                return Err(SyncError::malformed(
                                    member.path(hour),
                                    format!(
                                        "grid {:?} differs from the ensemble grid {:?}",
                                        field.coords.shape(),
                                        coords.shape()
                                    ),
                                ));
                            }
                            Some(_) => {}
                            None => self.coords = Some(field.coords),
                        }
                        self.masks.insert((hour, index), field.value);
                    }
                    None => missing.push(format!("{} f{:02}", member.name, member.member_hour(hour))),
                }
            }
        }
        Ok(missing)
    }

    /// Wait until every member hour is loaded. There is no degraded mode.
    pub async fn synchronize<C: GridCodec>(
        &mut self,
        loader: &MemberLoader<C>,
        sync: &Synchronizer,
    ) -> Result<SyncReport> {
        let report = sync
            .wait_until("HREF members", || {
                Ok(Readiness::from_missing(&self.load_available(loader)?))
            })
            .await?;
        info!(
            members = self.members.len(),
            hours = self.hours.len(),
            retries = report.retries,
            "Severe ensemble complete"
        );
        Ok(report)
    }
}

/// One thunder member's loaded hours, keyed by member forecast hour.
#[derive(Debug, Clone)]
pub struct LoadedMember {
    pub descriptor: MemberDescriptor,
    pub coords: Arc<GridCoords>,
    pub hours: BTreeMap<u32, PredictorHour>,
}

/// Thunder predictors for a range of cycle forecast hours.
#[derive(Debug)]
pub struct ThunderEnsemble {
    members: Vec<MemberDescriptor>,
    hours: Vec<u32>,
    loaded: Vec<Option<LoadedMember>>,
}

impl ThunderEnsemble {
    pub fn new(members: Vec<MemberDescriptor>, hours: RangeInclusive<u32>) -> Self {
        let loaded = vec![None; members.len()];
        Self {
            members,
            hours: hours.collect(),
            loaded,
        }
    }

    /// Member files loaded so far.
    pub fn loaded_files(&self) -> usize {
        self.loaded.iter().flatten().map(|m| m.hours.len()).sum()
    }

    /// Members with at least one loaded hour.
    pub fn loaded_members(&self) -> usize {
        self.loaded.iter().flatten().count()
    }

    /// Load whatever has arrived. Returns the member files still missing.
    pub fn load_available<C: GridCodec>(&mut self, loader: &MemberLoader<C>) -> Result<Vec<String>> {
        let mut missing = Vec::new();
        for (index, member) in self.members.iter().enumerate() {
            for &hour in &self.hours {
                if !member.covers(hour) {
                    continue;
                }
                let member_hour = member.member_hour(hour);
                if let Some(loaded) = &self.loaded[index] {
                    if loaded.hours.contains_key(&member_hour) {
                        continue;
                    }
                }
                match loader.predictor_hour(member, hour)? {
                    Some(field) => {
                        let slot = self.loaded[index].get_or_insert_with(|| LoadedMember {
                            descriptor: member.clone(),
                            coords: field.coords.clone(),
                            hours: BTreeMap::new(),
                        });
                        if slot.coords.shape() != field.coords.shape() {
                            return Err(SyncError::malformed(
                                member.path(hour),
                                "grid changed between forecast hours",
                            ));
                        }
                        slot.hours.insert(member_hour, field.value);
                    }
                    None => missing.push(format!("{} f{:02}", member.name, member_hour)),
                }
            }
        }
        Ok(missing)
    }

    /// Wait until at least `expected_files` member files are loaded.
    pub async fn synchronize<C: GridCodec>(
        &mut self,
        loader: &MemberLoader<C>,
        sync: &Synchronizer,
        expected_files: usize,
    ) -> Result<SyncReport> {
        let report = sync
            .wait_until("HREF thunder members", || {
                let missing = self.load_available(loader)?;
                let loaded = self.loaded_files();
                if loaded >= expected_files {
                    return Ok(Readiness::Ready);
                }
                Ok(Readiness::waiting(
                    expected_files - loaded,
                    format!(
                        "{} of {} files loaded; absent: {}",
                        loaded,
                        expected_files,
                        missing.join(", ")
                    ),
                ))
            })
            .await?;
        if report.delayed {
            warn!(retries = report.retries, "Thunder ensemble arrived late");
        }
        info!(
            files = self.loaded_files(),
            expected = expected_files,
            members = self.loaded_members(),
            "Thunder ensemble ready"
        );
        Ok(report)
    }

    /// Members that loaded at least one hour.
    pub fn into_members(self) -> Vec<LoadedMember> {
        self.loaded.into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::members::{severe_members, thunder_members, HireswCore, ModelRoots};
    use crate::retry::RetryPolicy;
    use calib_common::Cycle;
    use grib2_codec::Grib2Codec;
    use std::path::Path;
    use std::time::Duration;
    use test_utils::{arrive_later, Grib2Builder};

    fn roots(dir: &Path) -> ModelRoots {
        ModelRoots {
            hiresw: dir.join("hiresw"),
            hrrr: dir.join("hrrr"),
            nam: dir.join("nam"),
            nam_post: dir.join("spc_post"),
        }
    }

    fn write(path: &Path, bytes: &[u8]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, bytes).unwrap();
    }

    fn uh_file() -> Vec<u8> {
        Grib2Builder::new_uh_member().build()
    }

    fn thunder_file() -> Vec<u8> {
        Grib2Builder::new_uh_member()
            .with_parameter(16, 195)
            .with_level(103, 263)
            .instantaneous()
            .build()
    }

    fn policy(max_retries: u32) -> Synchronizer {
        Synchronizer::new(RetryPolicy::new(Duration::from_secs(60), max_retries))
    }

    #[tokio::test(start_paused = true)]
    async fn test_severe_waits_for_late_member() {
        let dir = tempfile::tempdir().unwrap();
        let cycle = Cycle::parse("20240501", "00").unwrap();
        let members = severe_members(&cycle, &roots(dir.path()), HireswCore::Fv3);
        let late = members[7].path(5);
        for member in &members {
            for hour in 2..=5 {
                if member.path(hour) != late {
                    write(&member.path(hour), &uh_file());
                }
            }
        }
        let arrival = arrive_later(late, Duration::from_secs(90), uh_file());

        let mut ensemble = SevereEnsemble::new(members, 2..=5);
        let loader = MemberLoader::new(Grib2Codec::new());
        let report = ensemble.synchronize(&loader, &policy(5)).await.unwrap();
        arrival.await.unwrap();

        assert_eq!(report.retries, 2);
        assert!(ensemble.is_complete());
        assert_eq!(ensemble.member_masks(7).len(), 4);
        assert_eq!(ensemble.coords().unwrap().shape(), (3, 4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_severe_aborts_without_degrading() {
        let dir = tempfile::tempdir().unwrap();
        let cycle = Cycle::parse("20240501", "12").unwrap();
        let members = severe_members(&cycle, &roots(dir.path()), HireswCore::Fv3);
        write(&members[0].path(1), &uh_file());

        let mut ensemble = SevereEnsemble::new(members, 1..=1);
        let loader = MemberLoader::new(Grib2Codec::new());
        let err = ensemble.synchronize(&loader, &policy(2)).await.unwrap_err();
        match err {
            SyncError::InsufficientEnsemble { retries, shortfall, .. } => {
                assert_eq!(retries, 2);
                assert!(shortfall.starts_with("9 missing"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(ensemble.loaded(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_thunder_proceeds_at_expected_count() {
        let dir = tempfile::tempdir().unwrap();
        let cycle = Cycle::parse("20240501", "00").unwrap();
        let members = thunder_members(&cycle, &roots(dir.path()), HireswCore::Fv3);
        // Six of ten members deliver both hours.
        for member in members.iter().take(6) {
            for hour in [1, 2] {
                write(&member.path(hour), &thunder_file());
            }
        }
        let mut ensemble = ThunderEnsemble::new(members, 1..=2);
        let loader = MemberLoader::new(Grib2Codec::new());
        let report = ensemble.synchronize(&loader, &policy(3), 12).await.unwrap();
        assert_eq!(report.retries, 0);
        assert_eq!(ensemble.loaded_files(), 12);
        assert_eq!(ensemble.loaded_members(), 6);

        let loaded = ensemble.into_members();
        assert_eq!(loaded.len(), 6);
        // Lagged member hours are shifted by the lag.
        assert!(loaded[1].hours.contains_key(&13));
    }

    #[tokio::test(start_paused = true)]
    async fn test_thunder_shortfall() {
        let dir = tempfile::tempdir().unwrap();
        let cycle = Cycle::parse("20240501", "00").unwrap();
        let members = thunder_members(&cycle, &roots(dir.path()), HireswCore::Fv3);
        write(&members[0].path(1), &thunder_file());

        let mut ensemble = ThunderEnsemble::new(members, 1..=1);
        let loader = MemberLoader::new(Grib2Codec::new());
        let err = ensemble.synchronize(&loader, &policy(1), 20).await.unwrap_err();
        match err {
            SyncError::InsufficientEnsemble { shortfall, .. } => {
                assert!(shortfall.contains("1 of 20 files loaded"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
