use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use crate::{
    error::ValidationError,
    model::{PositionRange, ServoId, ServoState, TelemetryUpdate},
};

#[derive(Debug, Default)]
struct StoreInner {
    servos: BTreeMap<ServoId, ServoState>,
    default_range: PositionRange,
    error: Option<String>,
}

impl StoreInner {
    fn entry(&mut self, id: ServoId) -> &mut ServoState {
        let range = self.default_range;
        self.servos.entry(id).or_insert_with(|| ServoState::new(id, range))
    }
}

/// Per-servo state plus the dashboard's inline error line.
///
/// Every mutation is applied inside one lock, so readers never see a
/// half-merged record. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct ServoStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl ServoStore {
    pub fn new(ids: impl IntoIterator<Item = ServoId>, range: PositionRange) -> Self {
        let servos = ids.into_iter().map(|id| (id, ServoState::new(id, range))).collect();
        Self {
            inner: Arc::new(Mutex::new(StoreInner { servos, default_range: range, error: None })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, id: ServoId) -> Option<ServoState> {
        self.lock().servos.get(&id).cloned()
    }

    pub fn ids(&self) -> Vec<ServoId> {
        self.lock().servos.keys().copied().collect()
    }

    pub fn snapshot(&self) -> Vec<ServoState> {
        self.lock().servos.values().cloned().collect()
    }

    /// Shallow merge: only the `Some` fields of `update` are written.
    pub fn apply_telemetry(&self, id: ServoId, update: TelemetryUpdate) {
        let mut inner = self.lock();
        let servo = inner.entry(id);
        if let Some(position) = update.position {
            servo.position = position;
        }
        let t = &mut servo.telemetry;
        if update.temperature.is_some() {
            t.temperature = update.temperature;
        }
        if update.current.is_some() {
            t.current = update.current;
        }
        if update.voltage.is_some() {
            t.voltage = update.voltage;
        }
        if update.speed.is_some() {
            t.speed = update.speed;
        }
    }

    /// Records the operator's target angle. The value is kept even when it is
    /// out of range; in that case the error line is set and the violation is
    /// returned. An in-range value clears the error line.
    pub fn set_pending_position(&self, id: ServoId, value: f64) -> Result<(), ValidationError> {
        let mut inner = self.lock();
        let servo = inner.entry(id);
        servo.pending_position = value;
        let check = servo.range.check(value);
        inner.error = check.as_ref().err().map(ToString::to_string);
        check
    }

    /// Confirmed position after the device acknowledged a move.
    pub fn confirm_position(&self, id: ServoId, value: f64) {
        self.lock().entry(id).position = value;
    }

    pub fn set_calibrating(&self, id: ServoId, calibrating: bool) {
        self.lock().entry(id).calibrating = calibrating;
    }

    pub fn error(&self) -> Option<String> {
        self.lock().error.clone()
    }

    pub fn set_error(&self, message: impl Into<String>) {
        self.lock().error = Some(message.into());
    }

    pub fn clear_error(&self) {
        self.lock().error = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> ServoStore {
        ServoStore::new((1..=4).map(ServoId), PositionRange::default())
    }

    #[test]
    fn seeded_records_start_empty() {
        let s = store();
        assert_eq!(s.ids(), vec![ServoId(1), ServoId(2), ServoId(3), ServoId(4)]);
        let servo = s.get(ServoId(2)).unwrap();
        assert_eq!(servo.position, 0.0);
        assert_eq!(servo.telemetry.temperature, None);
        assert!(!servo.calibrating);
    }

    #[test]
    fn telemetry_merge_keeps_unspecified_fields() {
        let s = store();
        s.apply_telemetry(
            ServoId(1),
            TelemetryUpdate { position: Some(90.0), temperature: Some(30.0), voltage: Some(7.4), ..Default::default() },
        );
        s.apply_telemetry(ServoId(1), TelemetryUpdate { temperature: Some(32.5), ..Default::default() });

        let servo = s.get(ServoId(1)).unwrap();
        assert_eq!(servo.position, 90.0);
        assert_eq!(servo.telemetry.temperature, Some(32.5));
        assert_eq!(servo.telemetry.voltage, Some(7.4));
        assert_eq!(servo.telemetry.current, None);
    }

    #[test]
    fn mutations_are_scoped_to_one_servo() {
        let s = store();
        s.apply_telemetry(ServoId(1), TelemetryUpdate { position: Some(10.0), ..Default::default() });
        s.set_calibrating(ServoId(1), true);
        let other = s.get(ServoId(2)).unwrap();
        assert_eq!(other.position, 0.0);
        assert!(!other.calibrating);
    }

    #[test]
    fn pending_position_never_touches_confirmed_position() {
        let s = store();
        s.confirm_position(ServoId(3), 90.0);
        s.set_pending_position(ServoId(3), 45.0).unwrap();
        let servo = s.get(ServoId(3)).unwrap();
        assert_eq!(servo.position, 90.0);
        assert_eq!(servo.pending_position, 45.0);
    }

    #[test]
    fn out_of_range_pending_value_is_flagged_not_clamped() {
        let s = store();
        let err = s.set_pending_position(ServoId(1), 200.0).unwrap_err();
        assert_eq!(err.to_string(), "Value exceeds the maximum of 180");
        assert_eq!(s.get(ServoId(1)).unwrap().pending_position, 200.0);
        assert_eq!(s.error().as_deref(), Some("Value exceeds the maximum of 180"));

        s.set_pending_position(ServoId(1), -1.0).unwrap_err();
        assert_eq!(s.error().as_deref(), Some("Value is below the minimum of 0"));

        s.set_pending_position(ServoId(1), 120.0).unwrap();
        assert_eq!(s.error(), None);
    }

    #[test]
    fn telemetry_for_unknown_servo_creates_record() {
        let s = store();
        s.apply_telemetry(ServoId(42), TelemetryUpdate { speed: Some(1.0), ..Default::default() });
        let servo = s.get(ServoId(42)).unwrap();
        assert_eq!(servo.range, PositionRange::default());
        assert_eq!(servo.telemetry.speed, Some(1.0));
    }
}
