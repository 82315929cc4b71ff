use super::*;
use segdl_core::checksum::DigestAlgo;

fn parse(args: &[&str]) -> Cli {
    let mut argv = vec!["segdl"];
    argv.extend_from_slice(args);
    Cli::try_parse_from(argv).unwrap()
}

fn get_args(args: &[&str]) -> GetArgs {
    match parse(args).command {
        CliCommand::Get(a) => a,
        other => panic!("expected get, got {:?}", other),
    }
}

#[test]
fn get_requires_at_least_one_url() {
    assert!(Cli::try_parse_from(["segdl", "get"]).is_err());
}

#[test]
fn get_collects_mirrors_in_order() {
    let a = get_args(&["get", "https://a.example/f.iso", "ftp://b.example/f.iso"]);
    assert_eq!(a.urls, vec!["https://a.example/f.iso", "ftp://b.example/f.iso"]);
    assert!(a.split.is_none());
    assert!(a.checksum.is_none());
    assert!(!a.no_resume);
}

#[test]
fn get_short_flags_and_negative_cap() {
    let a = get_args(&[
        "get", "-s", "3", "-x", "-1", "-d", "/tmp/dl", "-o", "out.bin", "https://a.example/f",
    ]);
    assert_eq!(a.split, Some(3));
    assert_eq!(a.max_connections, Some(-1));
    assert_eq!(a.dir.as_deref(), Some(std::path::Path::new("/tmp/dl")));
    assert_eq!(a.out.as_deref(), Some("out.bin"));
}

#[test]
fn get_parses_checksum_flag() {
    let hex = "a9993e364706816aba3e25717850c26c9cd0d89d";
    let a = get_args(&["get", "--checksum", &format!("SHA-1={}", hex), "https://a.example/f"]);
    let sum = a.checksum.unwrap();
    assert_eq!(sum.algo, DigestAlgo::Sha1);
    assert_eq!(sum.hex, hex);

    assert!(Cli::try_parse_from(["segdl", "get", "--checksum", "md5=00", "https://a.example/f"])
        .is_err());
}

#[test]
fn flags_override_config() {
    let a = get_args(&[
        "get",
        "--split",
        "2",
        "--max-connections",
        "8",
        "--referer",
        "https://ref.example/",
        "--check-integrity",
        "--allow-overwrite",
        "--no-resume",
        "--no-follow-torrent",
        "https://a.example/f",
    ]);
    let mut cfg = SegdlConfig::default();
    a.apply_to(&mut cfg);
    assert_eq!(cfg.split, 2);
    assert_eq!(cfg.max_connections, 8);
    assert_eq!(cfg.referer.as_deref(), Some("https://ref.example/"));
    assert!(cfg.check_integrity);
    assert!(cfg.allow_overwrite);
    assert!(!cfg.resume);
    assert!(!cfg.follow_torrent);
    assert!(cfg.follow_metalink);
}

#[test]
fn absent_flags_keep_config_values() {
    let a = get_args(&["get", "https://a.example/f"]);
    let mut cfg = SegdlConfig {
        split: 7,
        check_integrity: true,
        referer: Some("https://cfg.example/".into()),
        ..SegdlConfig::default()
    };
    a.apply_to(&mut cfg);
    assert_eq!(cfg.split, 7);
    assert!(cfg.check_integrity);
    assert!(cfg.resume);
    assert_eq!(cfg.referer.as_deref(), Some("https://cfg.example/"));
}

#[test]
fn url_request_defaults_to_current_dir() {
    let req = get_args(&["get", "https://a.example/f"]).url_request();
    assert_eq!(req.dir, PathBuf::from("."));
    assert!(req.out.is_none());
    assert_eq!(req.urls, vec!["https://a.example/f"]);
}

#[test]
fn checksum_command_defaults_to_sha256() {
    match parse(&["checksum", "file.iso"]).command {
        CliCommand::Checksum { path, algo } => {
            assert_eq!(path, PathBuf::from("file.iso"));
            assert_eq!(algo, DigestAlgo::Sha256);
        }
        other => panic!("expected checksum, got {:?}", other),
    }
    match parse(&["checksum", "--algo", "sha1", "f"]).command {
        CliCommand::Checksum { algo, .. } => assert_eq!(algo, DigestAlgo::Sha1),
        other => panic!("expected checksum, got {:?}", other),
    }
}
