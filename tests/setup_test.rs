//! Setup snapshots: capturing, persisting and restoring a camera.

mod common;

#[cfg(test)]
mod setup_tests {
    use super::common::*;
    use serde_json::json;
    use std::collections::BTreeMap;
    use vhdscan::{CameraError, CameraEvent, Setup, Slot, Status};

    #[test]
    fn test_get_setup_reflects_camera() {
        let harness = Harness::new();
        let unset = harness.camera(Slot::Right);
        assert!(unset.get_setup().is_empty());

        let (camera, _events) = harness.ready_camera(Slot::Left, 0);
        let setup = camera.get_setup();
        assert_eq!(setup.id, "1D6B:0100:0001");
        assert_eq!(setup.udev_name, "/dev/video0");
        assert_eq!(setup.resolution, "640x480xRGB3");
        assert_eq!(setup.controls.get("brightness"), Some(&0));
        assert_eq!(setup.controls.len(), 5);
    }

    #[test]
    fn test_save_and_open_on_another_camera() {
        let harness = Harness::new();
        let (camera, events) = harness.ready_camera(Slot::Left, 0);
        camera.set_resolution("320x240xRGB3").unwrap();
        camera.set_control("contrast", 50).unwrap();
        wait_for_event(&events, |e| matches!(e, CameraEvent::ControlChanged { .. }));

        let saved = camera.save();
        assert_eq!(saved["resolution"], "320x240xRGB3");
        assert_eq!(saved["controls"]["contrast"], 50);
        camera.assign(None, None, None).unwrap();

        // The device still has contrast 50; start the restore from a
        // different value so the probe has to write it.
        harness.tool.set_device_value("contrast", 10);
        harness.tool.set_device_value("white_balance_temperature_auto", 0);

        let restored = harness.camera(Slot::Right);
        let restored_events = restored.subscribe();
        restored.open(saved.clone()).unwrap();
        wait_for_event(&restored_events, |e| matches!(e, CameraEvent::Ready));

        assert_eq!(restored.device().unwrap().name(), "/dev/video0");
        assert_eq!(restored.resolution().unwrap().key(), "320x240xRGB3");
        assert_eq!(restored.control("contrast").unwrap().value(), 50);
        assert_eq!(
            restored.control("white_balance_temperature_auto").unwrap().value(),
            1
        );
        assert_eq!(restored.get_setup(), Setup::from_value(saved).unwrap());
    }

    #[test]
    fn test_unknown_device_clears_camera() {
        let harness = Harness::new();
        let (camera, events) = harness.ready_camera(Slot::Left, 0);

        let setup = Setup {
            id: "DEAD:BEEF:0001".to_string(),
            udev_name: "/dev/video0".to_string(),
            ..Setup::default()
        };
        assert!(matches!(camera.set_setup(&setup), Err(CameraError::DeviceBusy(_))));
        assert_eq!(camera.status(), Status::Unset);
        assert!(!harness.device(0).is_in_use());

        let seen = collect_until(&events, |e| matches!(e, CameraEvent::Ready));
        assert!(matches!(seen[0], CameraEvent::Status(Status::Unset)));
    }

    #[test]
    fn test_renamed_node_falls_back_to_id() {
        let harness = Harness::new();
        let camera = harness.camera(Slot::Left);
        let events = camera.subscribe();

        let setup = Setup {
            id: harness.device(1).id().to_string(),
            udev_name: "/dev/video5".to_string(),
            resolution: "320x240xRGB3".to_string(),
            controls: BTreeMap::new(),
        };
        camera.set_setup(&setup).unwrap();
        wait_for_event(&events, |e| matches!(e, CameraEvent::Ready));
        assert_eq!(camera.device().unwrap().name(), "/dev/video2");
        assert_eq!(camera.resolution().unwrap().key(), "320x240xRGB3");
    }

    #[test]
    fn test_setup_of_claimed_device_is_rejected() {
        let harness = Harness::new();
        let (left, _left_events) = harness.ready_camera(Slot::Left, 0);
        let right = harness.camera(Slot::Right);

        assert!(right.set_setup(&left.get_setup()).is_err());
        assert_eq!(right.status(), Status::Unset);
        assert_eq!(left.status(), Status::Idle);
        assert!(harness.device(0).is_in_use());
    }

    #[test]
    fn test_empty_setup_clears() {
        let harness = Harness::new();
        let (camera, _events) = harness.ready_camera(Slot::Left, 0);
        camera.open(json!({})).unwrap();
        assert_eq!(camera.status(), Status::Unset);
        assert!(!harness.device(0).is_in_use());
    }

    #[test]
    fn test_setup_rejected_while_probing() {
        let slow = Harness::with_tool(
            vhdscan::testing::ScriptedControlTool::new()
                .with_delay(std::time::Duration::from_millis(100)),
        );
        let probing = slow.camera(Slot::Left);
        probing.assign(Some(slow.device(0)), None, None).unwrap();

        let setup = Setup {
            id: slow.device(1).id().to_string(),
            ..Setup::default()
        };
        assert!(matches!(probing.set_setup(&setup), Err(CameraError::ProbeInFlight)));
        assert!(matches!(probing.set_setup(&Setup::default()), Err(CameraError::ProbeInFlight)));
        wait_for_status(&probing, Status::Idle);
    }

    #[test]
    fn test_invalid_setup_json() {
        let harness = Harness::new();
        let camera = harness.camera(Slot::Left);
        assert!(matches!(
            camera.open(json!({"id": 42})),
            Err(CameraError::Config(_))
        ));
        assert!(matches!(camera.open(json!("setup")), Err(CameraError::Config(_))));
        assert_eq!(camera.status(), Status::Unset);
    }

    #[test]
    fn test_setup_equality_is_structural() {
        let a: Setup = serde_json::from_value(json!({
            "id": "1D6B:0100:0001",
            "udev_name": "/dev/video0",
            "resolution": "640x480xRGB3",
            "controls": {"brightness": 3, "contrast": 32}
        }))
        .unwrap();
        let mut b = a.clone();
        assert_eq!(a, b);
        b.controls.insert("contrast".to_string(), 33);
        assert_ne!(a, b);
    }
}
