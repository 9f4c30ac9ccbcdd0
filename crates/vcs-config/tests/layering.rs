use std::fs;

use bstr::ByteSlice;
use vcs_config::{global_config_path, ConfigKey, ConfigScope, ConfigSet};

// The environment is process-wide, so everything that touches it lives in
// this one test.
#[test]
fn load_layers_global_then_local() {
    let home = tempfile::tempdir().unwrap();
    let repo = tempfile::tempdir().unwrap();
    let global = home.path().join("global.cfg");
    fs::write(
        &global,
        "[user]\n\tname = Global User\n\temail = global@example.com\n[init]\n\tdefaultBranch = trunk\n",
    )
    .unwrap();
    fs::write(repo.path().join("config"), "[user]\n\tname = Local User\n").unwrap();

    std::env::remove_var("GIT_CONFIG_NOGLOBAL");
    std::env::set_var("GIT_CONFIG_GLOBAL", &global);
    assert_eq!(global_config_path().as_deref(), Some(global.as_path()));

    let set = ConfigSet::load(Some(repo.path())).unwrap();
    assert_eq!(set.get_string("user.name").unwrap().as_deref(), Some("Local User"));
    assert_eq!(set.get_string("user.email").unwrap().as_deref(), Some("global@example.com"));
    assert_eq!(set.get_string("init.defaultbranch").unwrap().as_deref(), Some("trunk"));
    assert_eq!(set.files().len(), 2);

    // Without a repository only the global layer is read.
    let set = ConfigSet::load(None).unwrap();
    assert_eq!(set.get_string("user.name").unwrap().as_deref(), Some("Global User"));

    std::env::set_var("GIT_CONFIG_NOGLOBAL", "1");
    assert_eq!(global_config_path(), None);
    let set = ConfigSet::load(Some(repo.path())).unwrap();
    assert_eq!(set.get_string("user.email").unwrap(), None);
    std::env::remove_var("GIT_CONFIG_NOGLOBAL");
    std::env::remove_var("GIT_CONFIG_GLOBAL");
}

#[test]
fn edits_to_the_local_layer_persist() {
    let repo = tempfile::tempdir().unwrap();
    fs::write(
        repo.path().join("config"),
        "[core]\n\t# format\n\trepositoryformatversion = 0\n\tbare = false\n",
    )
    .unwrap();

    let mut set = ConfigSet::load_with_global(Some(repo.path()), None).unwrap();
    let local = set.file_mut(ConfigScope::Local).unwrap();
    local.set(&ConfigKey::parse("core.bare").unwrap(), b"true".as_bstr());
    local.set(&ConfigKey::parse("branch.main.remote").unwrap(), b"origin".as_bstr());
    local.save().unwrap();

    let text = fs::read_to_string(repo.path().join("config")).unwrap();
    assert_eq!(
        text,
        "[core]\n\t# format\n\trepositoryformatversion = 0\n\tbare = true\n[branch \"main\"]\n\tremote = origin\n"
    );
    let reloaded = ConfigSet::load_with_global(Some(repo.path()), None).unwrap();
    assert_eq!(reloaded.get_bool("core.bare").unwrap(), Some(true));
    assert_eq!(reloaded.get_string("branch.main.remote").unwrap().as_deref(), Some("origin"));
}

#[test]
fn malformed_file_reports_location() {
    let repo = tempfile::tempdir().unwrap();
    fs::write(repo.path().join("config"), "[core]\n\tbare = true\n[broken\n").unwrap();
    let err = ConfigSet::load_with_global(Some(repo.path()), None).unwrap_err();
    assert_eq!(err.kind(), vcs_utils::ErrorKind::Config);
    assert!(err.to_string().contains(":3:"), "{err}");
}
