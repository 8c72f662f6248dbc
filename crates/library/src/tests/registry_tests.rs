use super::helpers::*;
use crate::registry::{self, Registry};
use crate::*;
use anyhow::Result;
use tempfile::tempdir;

#[test]
fn register_and_find() -> Result<()> {
    let dir = tempdir()?;
    let lib = new_library(dir.path())?;
    let reg = Registry::new();

    reg.register("one", "/one", &lib)?;
    assert!(reg.is_name_open("one")?);
    assert!(!reg.is_name_open("two")?);

    let found = reg.find_open_by_name("one")?.expect("registered");
    assert!(found.same_as(&lib));
    assert!(reg.find_open_by_name("two")?.is_none());
    lib.close()?;
    Ok(())
}

#[test]
fn duplicate_name_is_rejected() -> Result<()> {
    let dir = tempdir()?;
    let lib = new_library(dir.path())?;
    let reg = Registry::new();

    reg.register("dup", "/a", &lib)?;
    let err = reg.register("dup", "/b", &lib).unwrap_err();
    assert!(matches!(err, LibraryError::AlreadyOpen(ref n) if n == "dup"));
    assert_eq!(reg.open_libraries()?.len(), 1);
    lib.close()?;
    Ok(())
}

#[test]
fn unregister_reports_presence() -> Result<()> {
    let dir = tempdir()?;
    let lib = new_library(dir.path())?;
    let reg = Registry::new();

    assert!(!reg.unregister(&lib)?);
    reg.register("x", "/x", &lib)?;
    assert!(reg.unregister(&lib)?);
    assert!(!reg.is_name_open("x")?);
    lib.close()?;
    Ok(())
}

#[test]
fn open_libraries_in_open_order() -> Result<()> {
    let dir_a = tempdir()?;
    let dir_b = tempdir()?;
    let a = new_library(dir_a.path())?;
    let b = new_library(dir_b.path())?;
    let reg = Registry::default();

    reg.register("alpha", "/music", &a)?;
    reg.register("beta", "/video", &b)?;
    assert_eq!(
        reg.open_libraries()?,
        vec![
            OpenLibrary {
                name: "alpha".to_string(),
                media_prefix: "/music".to_string(),
            },
            OpenLibrary {
                name: "beta".to_string(),
                media_prefix: "/video".to_string(),
            },
        ]
    );
    a.close()?;
    b.close()?;
    Ok(())
}

#[test]
fn open_and_close_update_global_registry() -> Result<()> {
    let dir = tempdir()?;
    let lib = new_library(dir.path())?;
    let name = lib.name()?;

    let global = registry::global();
    assert!(global.is_name_open(&name)?);
    let found = global.find_open_by_name(&name)?.expect("open library is registered");
    assert!(found.same_as(&lib));
    assert!(global
        .open_libraries()?
        .iter()
        .any(|o| o.name == name && o.media_prefix == "/music"));

    lib.close()?;
    assert!(!global.is_name_open(&name)?);
    assert!(global.find_open_by_name(&name)?.is_none());
    Ok(())
}
