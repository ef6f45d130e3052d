//! Integration tests for the profiles file schema.
//!
//! Profiles files are hand-written by users, so these tests pin down the
//! exact key names (`isDefault`, `localToRemote`, `remoteToLocal`, `kind`,
//! `data`) and the defaults applied to missing keys, in both the JSON and the
//! TOML spelling.

use std::collections::BTreeMap;

use sshfwd_core::{
    AuthKind, Direction, PortForward, Profile, ProfileError, ProfileSet, SshAuthMethod,
};

const PROFILES_JSON: &str = r#"{
    "office": {
        "isDefault": true,
        "ssh": {
            "host": "gateway.example.com",
            "user": "alice",
            "auth": [
                { "kind": "publickey", "data": "/home/alice/.ssh/id_ed25519" },
                { "kind": "password", "data": "" }
            ]
        },
        "localToRemote": [
            { "local": "127.0.0.1:3391", "remote": "10.0.0.7:3389" }
        ],
        "remoteToLocal": [
            { "local": "127.0.0.1:8080", "remote": "0.0.0.0:18080" }
        ]
    },
    "bare": {}
}"#;

#[test]
fn test_json_profiles_parse_with_camel_case_keys() {
    // Act
    let parsed: BTreeMap<String, Profile> =
        serde_json::from_str(PROFILES_JSON).expect("valid profiles JSON");

    // Assert
    let office = &parsed["office"];
    assert!(office.is_default);
    let ssh = office.ssh.as_ref().expect("ssh block");
    assert_eq!(ssh.host, "gateway.example.com");
    assert_eq!(ssh.user, "alice");
    assert_eq!(ssh.auth[0].kind, AuthKind::PublicKey);
    assert_eq!(ssh.auth[1], SshAuthMethod::password(""));
    assert_eq!(
        office.local_to_remote,
        vec![PortForward::new("127.0.0.1:3391", "10.0.0.7:3389")]
    );
    assert_eq!(office.remote_to_local.len(), 1);
}

#[test]
fn test_json_empty_profile_gets_defaults() {
    let parsed: BTreeMap<String, Profile> = serde_json::from_str(PROFILES_JSON).unwrap();
    let bare = &parsed["bare"];

    assert!(!bare.is_default);
    assert!(bare.ssh.is_none());
    assert!(bare.local_to_remote.is_empty());
    assert!(bare.remote_to_local.is_empty());
    // A profile without an ssh block still gets a usable connection template.
    assert_eq!(bare.ssh_connection().auth, vec![SshAuthMethod::password("")]);
}

#[test]
fn test_ssh_block_without_auth_defaults_to_password_prompt() {
    let parsed: Profile = serde_json::from_str(r#"{ "ssh": { "host": "h" } }"#).unwrap();
    let ssh = parsed.ssh.unwrap();
    assert_eq!(ssh.auth, vec![SshAuthMethod::password("")]);
}

#[test]
fn test_unknown_auth_kind_is_rejected() {
    let result: Result<Profile, _> =
        serde_json::from_str(r#"{ "ssh": { "auth": [{ "kind": "kerberos" }] } }"#);
    assert!(result.is_err(), "unknown auth kinds must not parse silently");
}

#[test]
fn test_host_key_uses_camel_case() {
    let parsed: Profile =
        serde_json::from_str(r#"{ "ssh": { "hostKey": "SHA256:abc" } }"#).unwrap();
    assert_eq!(parsed.ssh.unwrap().host_key.as_deref(), Some("SHA256:abc"));
}

#[test]
fn test_toml_profiles_use_the_same_schema() {
    let text = r#"
        [lab]
        isDefault = true
        localToRemote = [{ local = "127.0.0.1:5432", remote = "db.internal:5432" }]

        [lab.ssh]
        host = "bastion"
        user = "ops"
    "#;

    let parsed: BTreeMap<String, Profile> = toml::from_str(text).expect("valid TOML");
    let lab = &parsed["lab"];
    assert!(lab.is_default);
    assert_eq!(lab.ssh.as_ref().unwrap().host, "bastion");
    assert_eq!(lab.local_to_remote[0].remote, "db.internal:5432");
}

#[test]
fn test_file_profiles_merge_over_builtins_and_pick_default() {
    // Arrange
    let parsed: BTreeMap<String, Profile> = serde_json::from_str(PROFILES_JSON).unwrap();

    // Act
    let set = ProfileSet::with_overrides(parsed).expect("single default");
    let (name, _profile, rules) = set.resolve(None).expect("default resolves");

    // Assert: built-ins survive, the file's default is chosen, rules are ordered.
    assert!(set.get("rdp_server").is_some());
    assert_eq!(name, "office");
    assert_eq!(rules.len(), 2);
    assert_eq!(rules[0].direction(), Direction::LocalToRemote);
    assert_eq!(rules[1].direction(), Direction::RemoteToLocal);
    assert_eq!(rules[1].listen_address(), "0.0.0.0:18080");
}

#[test]
fn test_two_defaults_in_one_file_are_rejected() {
    let text = r#"{ "a": { "isDefault": true }, "b": { "isDefault": true } }"#;
    let parsed: BTreeMap<String, Profile> = serde_json::from_str(text).unwrap();

    let result = ProfileSet::with_overrides(parsed);

    assert!(matches!(result, Err(ProfileError::MultipleDefaults { .. })));
}
