// Copyright (c) The diagnostics Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{
    RoutineController, RoutineResultInfo, RoutineResultReceiver, RoutineResultSender,
    routine_result_channel,
};
use crate::{
    config::FakeControllerConfig,
    errors::ControllerError,
    routine::{
        PowerRoutineResult, RawRoutineResult, RoutineResult, RoutineType, StandardRoutineResult,
    },
};
use indexmap::IndexMap;
use serde::{Deserialize, de};
use std::{
    collections::HashMap,
    fmt,
    future::Future,
    sync::{Mutex, MutexGuard},
    time::Duration,
};
use tokio::sync::Notify;
use tracing::{debug, warn};

/// How long the fake controller waits before reporting a result.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum FakeDelay {
    /// Report the result as soon as the routine is started.
    #[default]
    Immediate,

    /// Report the result after a fixed delay.
    After(Duration),

    /// Never report a result until
    /// [`resolve_routine_for_testing`](FakeRoutineController::resolve_routine_for_testing)
    /// is called.
    Manual,
}

impl<'de> Deserialize<'de> for FakeDelay {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: de::Deserializer<'de>,
    {
        struct V;

        impl de::Visitor<'_> for V {
            type Value = FakeDelay;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                write!(
                    formatter,
                    "\"immediate\", \"manual\", or a duration such as \"2s\""
                )
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: de::Error,
            {
                match v {
                    "immediate" => Ok(FakeDelay::Immediate),
                    "manual" => Ok(FakeDelay::Manual),
                    other => humantime_serde::re::humantime::parse_duration(other)
                        .map(FakeDelay::After)
                        .map_err(|err| E::custom(format!("invalid delay `{other}`: {err}"))),
                }
            }
        }

        deserializer.deserialize_str(V)
    }
}

/// A routine controller with canned results.
///
/// Each instance is independent: construct one per test or per session and hand
/// it to whatever needs a [`RoutineController`].
///
/// Routines without a configured result complete with
/// [`StandardRoutineResult::ExecutionError`].
#[derive(Debug)]
pub struct FakeRoutineController {
    inner: Mutex<FakeInner>,
    routine_started: Notify,
}

#[derive(Debug)]
struct FakeInner {
    results: IndexMap<RoutineType, RawRoutineResult>,
    supported: Vec<RoutineType>,
    delay: FakeDelay,
    pending: Option<PendingRoutine>,
    run_counts: HashMap<RoutineType, usize>,
}

#[derive(Debug)]
struct PendingRoutine {
    info: RoutineResultInfo,
    sender: RoutineResultSender,
}

impl Default for FakeRoutineController {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeRoutineController {
    /// Creates a new fake controller that supports every routine and reports immediately.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(FakeInner {
                results: IndexMap::new(),
                supported: Self::all_routines().to_vec(),
                delay: FakeDelay::Immediate,
                pending: None,
                run_counts: HashMap::new(),
            }),
            routine_started: Notify::new(),
        }
    }

    /// Creates a fake controller from configuration.
    pub fn from_config(config: &FakeControllerConfig) -> Self {
        let this = Self::new();
        this.set_delay_for_testing(config.delay);
        if let Some(supported) = &config.supported_routines {
            this.set_fake_supported_routines(supported.iter().copied());
        }
        for (&routine, result) in &config.results {
            this.set_fake_routine_result(routine, result.to_routine_result());
        }
        this
    }

    /// Returns every routine type.
    pub fn all_routines() -> &'static [RoutineType] {
        RoutineType::ALL
    }

    /// Sets how long routines take to report.
    pub fn set_delay_for_testing(&self, delay: FakeDelay) {
        self.lock().delay = delay;
    }

    /// Sets the list returned by [`supported_routines`](RoutineController::supported_routines).
    pub fn set_fake_supported_routines(&self, routines: impl IntoIterator<Item = RoutineType>) {
        self.lock().supported = routines.into_iter().collect();
    }

    /// Sets the standard result reported for `routine`.
    pub fn set_fake_standard_routine_result(
        &self,
        routine: RoutineType,
        result: StandardRoutineResult,
    ) {
        self.set_fake_routine_result(routine, RoutineResult::Simple(result));
    }

    /// Sets the power result reported for `routine`.
    pub fn set_fake_power_routine_result(&self, routine: RoutineType, result: PowerRoutineResult) {
        self.set_fake_routine_result(routine, RoutineResult::Power(result));
    }

    /// Sets the result reported for `routine`.
    pub fn set_fake_routine_result(&self, routine: RoutineType, result: RoutineResult) {
        self.set_fake_raw_routine_result(routine, result.into());
    }

    /// Sets the raw result reported for `routine`, which may be malformed.
    pub fn set_fake_raw_routine_result(&self, routine: RoutineType, result: RawRoutineResult) {
        self.lock().results.insert(routine, result);
    }

    /// Returns true if a routine is waiting to be resolved with
    /// [`resolve_routine_for_testing`](Self::resolve_routine_for_testing).
    pub fn is_routine_pending(&self) -> bool {
        self.lock().pending.is_some()
    }

    /// Returns the number of times `routine` has been started.
    pub fn run_count(&self, routine: RoutineType) -> usize {
        self.lock().run_counts.get(&routine).copied().unwrap_or(0)
    }

    /// Waits for a routine to be started under [`FakeDelay::Manual`], then reports its result.
    ///
    /// Returns the routine that was resolved.
    pub async fn resolve_routine_for_testing(&self) -> RoutineType {
        loop {
            // Take the pending routine in its own statement so the guard is
            // dropped before awaiting.
            let pending = self.lock().pending.take();
            if let Some(PendingRoutine { info, sender }) = pending {
                debug!(routine = %info.routine, "resolving pending routine");
                if sender.send(info).is_err() {
                    debug!(routine = %info.routine, "result receiver was dropped");
                }
                return info.routine;
            }
            self.routine_started.notified().await;
        }
    }

    fn lock(&self) -> MutexGuard<'_, FakeInner> {
        // The lock is never held across an await point or while calling out, so poisoning can
        // only come from a panic in this module.
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl RoutineController for FakeRoutineController {
    fn run_routine(&self, routine: RoutineType) -> RoutineResultReceiver {
        let (sender, receiver) = routine_result_channel();

        let mut inner = self.lock();
        *inner.run_counts.entry(routine).or_default() += 1;
        let result = inner
            .results
            .get(&routine)
            .copied()
            .unwrap_or_else(|| RoutineResult::Simple(StandardRoutineResult::ExecutionError).into());
        let info = RoutineResultInfo { routine, result };

        let delay = inner.delay;
        match delay {
            FakeDelay::Immediate => {
                // A dropped receiver just means nobody is waiting any more.
                _ = sender.send(info);
            }
            FakeDelay::After(delay) => {
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    _ = sender.send(info);
                });
            }
            FakeDelay::Manual => {
                if let Some(previous) = inner.pending.replace(PendingRoutine { info, sender }) {
                    warn!(
                        routine = %previous.info.routine,
                        "fake controller replaced a routine that was never resolved"
                    );
                }
                drop(inner);
                self.routine_started.notify_one();
            }
        }

        receiver
    }

    fn supported_routines(
        &self,
    ) -> impl Future<Output = Result<Vec<RoutineType>, ControllerError>> + Send {
        let supported = self.lock().supported.clone();
        async move { Ok(supported) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn unconfigured_routine_reports_execution_error() {
        let controller = FakeRoutineController::new();
        let info = controller
            .run_routine(RoutineType::CpuPrime)
            .await
            .expect("immediate result is sent");
        assert_eq!(info.routine, RoutineType::CpuPrime);
        assert_eq!(
            RoutineResult::try_from(info.result),
            Ok(RoutineResult::Simple(StandardRoutineResult::ExecutionError))
        );
    }

    #[tokio::test]
    async fn configured_results_are_reported() {
        let controller = FakeRoutineController::new();
        let power = PowerRoutineResult {
            simple_result: StandardRoutineResult::Passed,
            is_charging: true,
            percent_delta: 4,
            time_delta_seconds: 60,
        };
        controller.set_fake_power_routine_result(RoutineType::BatteryCharge, power);
        controller
            .set_fake_standard_routine_result(RoutineType::Memory, StandardRoutineResult::Failed);

        let info = controller
            .run_routine(RoutineType::BatteryCharge)
            .await
            .unwrap();
        assert_eq!(RoutineResult::try_from(info.result), Ok(power.into()));

        let info = controller.run_routine(RoutineType::Memory).await.unwrap();
        assert_eq!(
            RoutineResult::try_from(info.result),
            Ok(StandardRoutineResult::Failed.into())
        );
        assert_eq!(controller.run_count(RoutineType::Memory), 1);
    }

    #[tokio::test]
    async fn manual_delay_waits_for_resolution() {
        let controller = FakeRoutineController::new();
        controller.set_delay_for_testing(FakeDelay::Manual);

        let mut receiver = controller.run_routine(RoutineType::CpuCache);
        assert!(controller.is_routine_pending());
        assert!(receiver.try_recv().is_err(), "nothing reported yet");

        assert_eq!(
            controller.resolve_routine_for_testing().await,
            RoutineType::CpuCache
        );
        assert!(!controller.is_routine_pending());
        let info = receiver.await.unwrap();
        assert_eq!(info.routine, RoutineType::CpuCache);
    }

    #[tokio::test(start_paused = true)]
    async fn fixed_delay_reports_later() {
        let controller = FakeRoutineController::new();
        controller.set_delay_for_testing(FakeDelay::After(Duration::from_secs(5)));
        controller
            .set_fake_standard_routine_result(RoutineType::CpuStress, StandardRoutineResult::Passed);

        let info = controller.run_routine(RoutineType::CpuStress).await.unwrap();
        assert_eq!(
            RoutineResult::try_from(info.result),
            Ok(StandardRoutineResult::Passed.into())
        );
    }

    #[tokio::test]
    async fn supported_routines_default_to_all() {
        let controller = FakeRoutineController::new();
        assert_eq!(
            controller.supported_routines().await.unwrap(),
            RoutineType::ALL.to_vec()
        );

        controller.set_fake_supported_routines([RoutineType::Memory]);
        assert_eq!(
            controller.supported_routines().await.unwrap(),
            vec![RoutineType::Memory]
        );
    }

    #[test]
    fn delay_deserialization() {
        #[derive(Deserialize)]
        struct Wrapper {
            delay: FakeDelay,
        }

        let parse = |s: &str| toml::from_str::<Wrapper>(s).map(|w| w.delay);
        assert_eq!(parse(r#"delay = "immediate""#).unwrap(), FakeDelay::Immediate);
        assert_eq!(parse(r#"delay = "manual""#).unwrap(), FakeDelay::Manual);
        assert_eq!(
            parse(r#"delay = "250ms""#).unwrap(),
            FakeDelay::After(Duration::from_millis(250))
        );
        assert!(parse(r#"delay = "soon""#).is_err());
    }
}
