//! Proxy detection, unwrapping and configuration loading

use std::fs;
use std::sync::Arc;

use interpose_engine::config::ConfigError;
use interpose_engine::proxy::{
    interceptors_of, is_proxy, try_unwrap_proxy, unproxied_instance, unproxied_instance_deep, unproxied_type,
};
use tempfile::tempdir;

use super::harness::*;

// ============================================================================
// 1. Unwrapping
// ============================================================================

#[test]
fn test_plain_objects_are_not_proxies() {
    let plain = ObjectRef::new(&calculator());
    assert!(!is_proxy(&plain));
    assert!(try_unwrap_proxy(&plain).is_none());
    assert!(interceptors_of(&plain).is_none());
    assert!(unproxied_instance(&plain).unwrap().ptr_eq(&plain));
    assert_eq!(unproxied_type(&plain).id(), plain.type_ref().id());
}

#[test]
fn test_unwrap_by_shape() {
    let generator = ProxyGenerator::new();
    let options = GenerationOptions::default();
    let iface = greeter_iface();
    let greeter = greeter_class(&iface, &counter());
    let target = ObjectRef::new(&greeter);

    let class_proxy = generator
        .create_class_proxy(&greeter, &[], &options, vec![doubling(), doubling()])
        .unwrap();
    assert!(is_proxy(&class_proxy));
    assert!(unproxied_instance(&class_proxy).unwrap().ptr_eq(&class_proxy));
    assert_eq!(unproxied_type(&class_proxy).id(), greeter.id());
    assert_eq!(interceptors_of(&class_proxy).unwrap().len(), 2);

    let forwarding = generator
        .create_interface_proxy_with_target(&iface, &[], &target, &options, vec![])
        .unwrap();
    let unwrapped = try_unwrap_proxy(&forwarding).unwrap();
    assert!(unwrapped.target.unwrap().ptr_eq(&target));
    assert_eq!(unwrapped.proxy_id, forwarding.id());
    assert_eq!(unwrapped.proxy_type.shape(), ProxyShape::InterfaceProxyWithTarget);
    assert_eq!(unproxied_type(&forwarding).id(), greeter.id());

    let hollow = generator
        .create_interface_proxy_without_target(&iface, &[], &options, vec![])
        .unwrap();
    assert!(unproxied_instance(&hollow).is_none());
    assert!(Arc::ptr_eq(&unproxied_type(&hollow), hollow.type_ref()));
    assert_ne!(unproxied_type(&hollow).id(), iface.id());
}

#[test]
fn test_nested_proxies_unwrap_to_the_innermost_instance() {
    let generator = ProxyGenerator::new();
    let options = GenerationOptions::default();
    let iface = greeter_iface();
    let target = ObjectRef::new(&greeter_class(&iface, &counter()));
    let log = new_log();

    let inner = generator
        .create_interface_proxy_with_target(&iface, &[], &target, &options, vec![recording(&log, "inner")])
        .unwrap();
    let outer = generator
        .create_interface_proxy_with_target(&iface, &[], &inner, &options, vec![recording(&log, "outer")])
        .unwrap();

    assert_eq!(outer.invoke("Greet", &[Value::from("Ada")]).unwrap(), Value::from("Hello, Ada"));
    assert_eq!(entries(&log), vec!["outer:Greet", "inner:Greet"]);

    assert!(unproxied_instance(&outer).unwrap().ptr_eq(&inner));
    assert!(unproxied_instance_deep(&outer).unwrap().ptr_eq(&target));
    assert!(Arc::ptr_eq(&unproxied_type(&outer), inner.type_ref()));
}

// ============================================================================
// 2. Configuration Files
// ============================================================================

#[test]
fn test_config_file_drives_namespace_and_grants() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("interpose.toml");
    fs::write(
        &path,
        r#"
[scope]
namespace = "Plugins.Proxies"

[visibility]
grants = ["plugins/**"]
"#,
    )
    .unwrap();

    let config = EngineConfig::from_file(&path).unwrap();
    assert!(config.grants_module("plugins/reports"));
    assert!(!config.grants_module("plugins"));

    let internal = TypeBuilder::interface("IReport")
        .module(&ModuleInfo::new("plugins/reports"))
        .visibility(Visibility::Internal)
        .method(MethodDef::build("Render").returns(&builtin::string()))
        .build();
    let proxy = ProxyGenerator::with_config(&config)
        .create_interface_proxy_without_target(&internal, &[], &GenerationOptions::default(), vec![returning("<report/>")])
        .unwrap();

    assert_eq!(proxy.invoke("Render", &[]).unwrap(), Value::from("<report/>"));
    assert!(try_unwrap_proxy(&proxy).unwrap().proxy_type.name().starts_with("Plugins.Proxies.IReportProxy"));
}

#[test]
fn test_config_file_errors() {
    let dir = tempdir().unwrap();

    let missing = EngineConfig::from_file(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(missing, ConfigError::Io(_)));

    let path = dir.path().join("bad.toml");
    fs::write(&path, "[scope]\nnamespace = \"not a namespace\"\n").unwrap();
    assert!(matches!(
        EngineConfig::from_file(&path).unwrap_err(),
        ConfigError::Validation(_)
    ));
}
