//! Live settings cache
//!
//! Holds the resolved slider mapping and feature toggles as one immutable
//! snapshot. A refresh re-reads every tracked key and swaps the snapshot in
//! one step, so readers see either the old or the new values, never a mix.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::store::SettingsStore;
use crate::engine::actions::{GestureAction, SliderTarget};
use crate::input::{GestureCode, SliderPosition};
use crate::profile::DeviceProfile;

/// Point-in-time view of every tracked setting
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsSnapshot {
    /// `None` when the stored value is not a recognized action
    pub slider_top: Option<SliderTarget>,
    pub slider_middle: Option<SliderTarget>,
    pub slider_bottom: Option<SliderTarget>,
    pub haptic_feedback_enabled: bool,
    pub proximity_check_enabled: bool,
    pub setup_complete: bool,
    pub gesture_actions: HashMap<GestureCode, GestureAction>,
}

impl SettingsSnapshot {
    pub fn slider(&self, position: SliderPosition) -> Option<SliderTarget> {
        match position {
            SliderPosition::Top => self.slider_top,
            SliderPosition::Middle => self.slider_middle,
            SliderPosition::Bottom => self.slider_bottom,
        }
    }

    pub fn gesture_action(&self, code: GestureCode) -> Option<&GestureAction> {
        self.gesture_actions.get(&code)
    }
}

/// Process-wide settings cache for one device profile
pub struct SettingsCache {
    store: Arc<dyn SettingsStore>,
    profile: Arc<DeviceProfile>,
    snapshot: ArcSwap<SettingsSnapshot>,
    /// Serializes refreshes so a slower one cannot publish over a newer one
    refresh: Mutex<()>,
}

impl SettingsCache {
    /// Populate the cache from the store, falling back to profile defaults
    pub fn init(store: Arc<dyn SettingsStore>, profile: Arc<DeviceProfile>) -> Self {
        let snapshot = read_snapshot(store.as_ref(), &profile);
        debug!(?snapshot, "settings cache initialized");

        Self {
            store,
            profile,
            snapshot: ArcSwap::from_pointee(snapshot),
            refresh: Mutex::new(()),
        }
    }

    /// Latest snapshot; never blocks
    pub fn get(&self) -> Arc<SettingsSnapshot> {
        self.snapshot.load_full()
    }

    /// Re-read all tracked keys after the backing store changed
    pub fn on_external_change(&self) {
        let _refresh = self.refresh.lock().unwrap_or_else(|e| e.into_inner());
        let snapshot = read_snapshot(self.store.as_ref(), &self.profile);
        debug!(?snapshot, "settings cache refreshed");
        self.snapshot.store(Arc::new(snapshot));
    }

    pub fn store(&self) -> &Arc<dyn SettingsStore> {
        &self.store
    }
}

fn read_snapshot(store: &dyn SettingsStore, profile: &DeviceProfile) -> SettingsSnapshot {
    let slider = |position: SliderPosition| {
        let index = position.index();
        let key = profile.slider_keys[index];
        let raw = read_int(store, key, profile.slider_defaults[index]);
        let target = profile.slider_encoding.decode(raw);
        if target.is_none() {
            warn!(key, raw, %position, "unrecognized slider action, position will pass through");
        }
        target
    };

    let proximity_check_enabled = match profile.proximity.setting_key {
        Some(key) => read_bool(store, key, profile.proximity.default_enabled),
        None => profile.proximity.default_enabled,
    };

    let setup_complete = match profile.setup_key {
        Some(key) => read_bool(store, key, true),
        None => true,
    };

    let gesture_actions = profile
        .gestures
        .iter()
        .map(|binding| {
            let raw = binding
                .pref_key
                .and_then(|key| store.get_string(key))
                .unwrap_or_else(|| binding.default_action.to_string());
            (binding.code, GestureAction::parse(&raw))
        })
        .collect();

    SettingsSnapshot {
        slider_top: slider(SliderPosition::Top),
        slider_middle: slider(SliderPosition::Middle),
        slider_bottom: slider(SliderPosition::Bottom),
        haptic_feedback_enabled: read_bool(store, profile.haptic_key, true),
        proximity_check_enabled,
        setup_complete,
        gesture_actions,
    }
}

fn read_int(store: &dyn SettingsStore, key: &str, default: i32) -> i32 {
    match store.get_int(key) {
        Ok(Some(value)) => value,
        Ok(None) => default,
        Err(e) => {
            warn!(?e, key, default, "unreadable setting, using default");
            default
        }
    }
}

fn read_bool(store: &dyn SettingsStore, key: &str, default: bool) -> bool {
    read_int(store, key, i32::from(default)) != 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::actions::SliderAction;
    use crate::events::MediaKey;
    use crate::settings::store::tests::MemoryStore;
    use crate::settings::store::SettingValue;
    use crate::settings::SettingsError;

    fn cache_for(profile: DeviceProfile) -> (Arc<MemoryStore>, SettingsCache) {
        let store = Arc::new(MemoryStore::default());
        let cache = SettingsCache::init(store.clone(), Arc::new(profile));
        (store, cache)
    }

    #[test]
    fn test_touch_gesture_defaults() {
        let (_, cache) = cache_for(DeviceProfile::touch_gestures());
        let snapshot = cache.get();

        assert_eq!(
            snapshot.slider(SliderPosition::Top),
            Some(SliderTarget::Mode(SliderAction::AlarmsOnly))
        );
        assert_eq!(
            snapshot.slider(SliderPosition::Middle),
            Some(SliderTarget::Mode(SliderAction::PriorityOnly))
        );
        assert_eq!(
            snapshot.slider(SliderPosition::Bottom),
            Some(SliderTarget::Mode(SliderAction::None))
        );
        assert!(snapshot.haptic_feedback_enabled);
        assert!(snapshot.setup_complete);
        assert_eq!(
            snapshot.gesture_action(GestureCode::SwipeDown),
            Some(&GestureAction::Media(MediaKey::PlayPause))
        );
    }

    #[test]
    fn test_flip_camera_defaults() {
        let (_, cache) = cache_for(DeviceProfile::flip_camera());
        let snapshot = cache.get();

        assert_eq!(
            snapshot.slider(SliderPosition::Top),
            Some(SliderTarget::Mode(SliderAction::AlarmsOnly))
        );
        assert_eq!(
            snapshot.slider(SliderPosition::Bottom),
            Some(SliderTarget::Mode(SliderAction::None))
        );
        assert!(snapshot.proximity_check_enabled);
        assert_eq!(
            snapshot.gesture_action(GestureCode::FlipCamera),
            Some(&GestureAction::Camera)
        );
    }

    #[test]
    fn test_change_is_invisible_until_notified() {
        let (store, cache) = cache_for(DeviceProfile::touch_gestures());
        let before = cache.get();

        store
            .put("device_oppo_common_notification_slider_up1", SettingValue::Int(605))
            .unwrap();
        assert_eq!(cache.get(), before);

        cache.on_external_change();
        assert_eq!(
            cache.get().slider(SliderPosition::Top),
            Some(SliderTarget::Mode(SliderAction::Ring))
        );
        // Readers holding the old snapshot keep a consistent view
        assert_eq!(
            before.slider(SliderPosition::Top),
            Some(SliderTarget::Mode(SliderAction::AlarmsOnly))
        );
    }

    #[test]
    fn test_bad_values_fall_back_or_pass_through() {
        let (store, cache) = cache_for(DeviceProfile::flip_camera());
        store
            .put("touchscreen_gesture_haptic_feedback", "maybe".into())
            .unwrap();
        store
            .put("device_oppo_common_notification_slider_middle", SettingValue::Int(42))
            .unwrap();
        cache.on_external_change();

        let snapshot = cache.get();
        assert!(snapshot.haptic_feedback_enabled);
        assert_eq!(snapshot.slider(SliderPosition::Middle), None);
    }

    #[test]
    fn test_gesture_preference_overrides_default() {
        let (store, cache) = cache_for(DeviceProfile::touch_gestures());
        store.put("gesture_circle", "**null**".into()).unwrap();
        cache.on_external_change();

        assert_eq!(
            cache.get().gesture_action(GestureCode::Circle),
            Some(&GestureAction::Null)
        );
    }

    /// Store that parks the first armed read of the haptic key until resumed
    struct PausingStore {
        inner: MemoryStore,
        armed: std::sync::atomic::AtomicBool,
        entered: Mutex<std::sync::mpsc::Sender<()>>,
        resume: Mutex<std::sync::mpsc::Receiver<()>>,
    }

    impl SettingsStore for PausingStore {
        fn get(&self, key: &str) -> Option<SettingValue> {
            if key == "device_oppo_common_notification_slider_haptic_feedback"
                && self.armed.swap(false, std::sync::atomic::Ordering::SeqCst)
            {
                self.entered.lock().unwrap().send(()).unwrap();
                self.resume.lock().unwrap().recv().unwrap();
            }
            self.inner.get(key)
        }

        fn put(&self, key: &str, value: SettingValue) -> Result<(), SettingsError> {
            self.inner.put(key, value)
        }

        fn entries(&self) -> std::collections::BTreeMap<String, SettingValue> {
            self.inner.entries()
        }
    }

    #[test]
    fn test_overlapping_refreshes_keep_the_latest_write() {
        use std::sync::atomic::Ordering;
        use std::thread;
        use std::time::Duration;

        let (entered_tx, entered_rx) = std::sync::mpsc::channel();
        let (resume_tx, resume_rx) = std::sync::mpsc::channel();
        let store = Arc::new(PausingStore {
            inner: MemoryStore::default(),
            armed: Default::default(),
            entered: Mutex::new(entered_tx),
            resume: Mutex::new(resume_rx),
        });
        let cache = Arc::new(SettingsCache::init(
            store.clone(),
            Arc::new(DeviceProfile::touch_gestures()),
        ));

        // First refresh has read the slider keys and is parked mid-snapshot
        store.armed.store(true, Ordering::SeqCst);
        let first = {
            let cache = Arc::clone(&cache);
            thread::spawn(move || cache.on_external_change())
        };
        entered_rx.recv().unwrap();

        let second = {
            let cache = Arc::clone(&cache);
            let store = Arc::clone(&store);
            thread::spawn(move || {
                store
                    .put("device_oppo_common_notification_slider_up1", SettingValue::Int(605))
                    .unwrap();
                cache.on_external_change();
            })
        };
        thread::sleep(Duration::from_millis(50));
        resume_tx.send(()).unwrap();

        first.join().unwrap();
        second.join().unwrap();

        assert_eq!(
            cache.get().slider(SliderPosition::Top),
            Some(SliderTarget::Mode(SliderAction::Ring))
        );
    }
}
