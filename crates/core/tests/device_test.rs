use llmserve_core::runtime::backend_label;
use llmserve_core::{DeviceKind, prepare_device};

#[test]
fn device_names_parse_case_insensitively() {
    assert_eq!("CPU".parse::<DeviceKind>().unwrap(), DeviceKind::Cpu);
    assert_eq!("cuda".parse::<DeviceKind>().unwrap(), DeviceKind::Cuda);
    assert_eq!(" metal ".parse::<DeviceKind>().unwrap(), DeviceKind::Metal);
    assert_eq!("vulkan".parse::<DeviceKind>().unwrap(), DeviceKind::Vulkan);
    assert_eq!("rocm".parse::<DeviceKind>().unwrap(), DeviceKind::Rocm);
    assert!("tpu".parse::<DeviceKind>().is_err());
}

#[test]
fn cpu_device_always_prepares() {
    let device = prepare_device(DeviceKind::Cpu).unwrap();
    assert_eq!(backend_label(&device), "cpu");
}

#[test]
fn backends_without_candle_support_are_rejected() {
    for kind in [DeviceKind::Vulkan, DeviceKind::Rocm] {
        let err = prepare_device(kind).unwrap_err();
        assert!(err.to_string().contains("not supported"), "{err}");
    }
}
