use std::time::{Duration, Instant};

use lineproto_core::telemetry::profile;

#[test]
fn elapsed_us_reports_elapsed_time() {
    let started_at = Instant::now();
    std::thread::sleep(Duration::from_millis(1));
    assert!(profile::elapsed_us(started_at) >= 1_000);
}

#[cfg(feature = "profiling")]
mod profile_tag_stack_tests {
    use std::sync::Mutex;

    use lineproto_core::telemetry::profile;
    use lineproto_core::telemetry::tags;

    static PROFILE_TAG_MUTEX: Mutex<()> = Mutex::new(());

    #[test]
    fn supports_enabling_multiple_tags_together() {
        let _guard = PROFILE_TAG_MUTEX.lock().expect("profile tag lock poisoned");

        profile::set_enabled_tags(&[tags::TAG_POOL, tags::TAG_READER]);

        assert!(profile::is_tag_stack_enabled(&[tags::TAG_SYSTEM, tags::TAG_POOL]));
        assert!(profile::is_tag_stack_enabled(&[tags::TAG_SYSTEM, tags::TAG_READER]));
        assert!(!profile::is_tag_stack_enabled(&[tags::TAG_SYSTEM, tags::TAG_INGEST]));

        profile::set_enabled_tags(&[]);
    }

    #[test]
    fn system_tag_enables_every_stack() {
        let _guard = PROFILE_TAG_MUTEX.lock().expect("profile tag lock poisoned");

        profile::set_enabled_tags(&[tags::TAG_SYSTEM]);
        assert!(profile::is_tag_stack_enabled(&[tags::TAG_SYSTEM, tags::TAG_INGEST]));

        profile::set_enabled_tags(&["*"]);
        assert!(profile::is_tag_stack_enabled(&["anything"]));

        profile::set_enabled_tags(&[]);
    }
}

#[cfg(not(feature = "profiling"))]
mod profile_tag_stack_disabled_tests {
    use lineproto_core::telemetry::profile;
    use lineproto_core::telemetry::tags;

    #[test]
    fn every_stack_is_disabled_without_the_feature() {
        profile::set_enabled_tags(&[tags::TAG_POOL]);
        assert!(!profile::is_tag_stack_enabled(&[tags::TAG_SYSTEM, tags::TAG_POOL]));
    }
}
