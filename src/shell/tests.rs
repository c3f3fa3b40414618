use embassy_futures::block_on;

use super::*;
use crate::{
    config::SdDiagConfig,
    session::MountState,
    testing::{test_config, RamCard, RamVolume, TEST_BLOCK_SIZE, TEST_CAPACITY},
};

type TestService = SdService<RamCard, RamVolume, bool, TEST_CAPACITY>;

fn service_with(config: SdDiagConfig, gate: bool) -> TestService {
    SdService::new(RamCard::new(TEST_BLOCK_SIZE, 256), RamVolume::new(), gate, config).unwrap()
}

fn service() -> TestService {
    service_with(test_config(), true)
}

fn run(service: &mut TestService, line: &str) -> (CommandStatus, std::string::String) {
    let mut out = std::string::String::new();
    let status = block_on(service.execute_line(line.as_bytes(), &mut out));
    (status, out)
}

fn listing_lines(out: &str) -> Vec<&str> {
    out.split("\r\n")
        .filter(|line| !line.is_empty() && !line.starts_with("FS:"))
        .collect()
}

#[test]
fn mount_and_umount_report_their_noops() {
    let mut service = service();
    assert_eq!(run(&mut service, "SDMOUNT"), (CommandStatus::Ok, "f_mount OK\r\n".into()));
    assert_eq!(
        run(&mut service, "SDMOUNT"),
        (CommandStatus::Ok, "File System already mounted\r\n".into())
    );
    assert_eq!(
        run(&mut service, "SDUMOUNT"),
        (CommandStatus::Ok, "Umount filesystem...\r\n".into())
    );
    assert_eq!(
        run(&mut service, "SDUMOUNT"),
        (CommandStatus::Ok, "File System already unmounted\r\n".into())
    );
    assert_eq!(service.session().card().connects, 1);
    assert_eq!(service.session().card().disconnects, 1);
}

#[test]
fn mount_failure_prints_the_code() {
    let mut service = service();
    service.session_mut().card_mut().fail_connect = true;
    let (status, out) = run(&mut service, "SDMOUNT");
    assert_eq!(status, CommandStatus::Failed);
    assert_eq!(out, "mount error:-1\r\n");
}

#[test]
fn ls_walks_the_tree_in_listing_order() {
    let mut service = service();
    let volume = service.session_mut().volume_mut();
    volume.insert_file("/a.txt", b"abc");
    volume.insert_file("/.hidden", b"secret");
    volume.insert_dir("/logs");
    volume.insert_file("/logs/x.bin", b"12345");
    volume.insert_dir("/logs/deep");
    volume.insert_file("/logs/deep/y", b"1");
    volume.insert_dir("/zeta");
    volume.insert_file("/zeta/z", b"22");
    volume.insert_dir("/.git");
    volume.insert_file("/.git/HEAD", b"ref");

    let (status, out) = run(&mut service, "SDLS");
    assert_eq!(status, CommandStatus::Ok);
    assert!(out.starts_with("FS: 1000 free clusters, 8 sectors/cluster, 16 bytes/sector\r\n"));
    assert!(out.contains("FS: 125 KBytes free (0 MBytes free)\r\n"));
    assert_eq!(
        listing_lines(&out),
        vec![
            "/logs/deep/y 1 bytes",
            "/logs/x.bin 5 bytes",
            "/zeta/z 2 bytes",
            "./a.txt 3 bytes",
        ]
    );
    assert_eq!(service.session().mount_state(), MountState::Mounted);

    let (status, out) = run(&mut service, "SDLS /logs/");
    assert_eq!(status, CommandStatus::Ok);
    assert_eq!(
        listing_lines(&out),
        vec!["/logs/deep/y 1 bytes", "/logs/x.bin 5 bytes"]
    );
}

#[test]
fn ls_visits_every_sibling_directory() {
    let mut service = service();
    let volume = service.session_mut().volume_mut();
    for idx in 0..20 {
        volume.insert_dir(&format!("/d{:02}", idx));
        volume.insert_file(&format!("/d{:02}/f.txt", idx), b"x");
    }
    volume.insert_dir("/d03/inner");
    volume.insert_file("/d03/inner/g", b"yy");

    let (status, out) = run(&mut service, "SDLS");
    assert_eq!(status, CommandStatus::Ok);
    let lines = listing_lines(&out);
    assert_eq!(lines.len(), 21);
    assert_eq!(lines[0], "/d00/f.txt 1 bytes");
    assert_eq!(lines[3], "/d03/inner/g 2 bytes");
    assert_eq!(lines[4], "/d03/f.txt 1 bytes");
    assert_eq!(lines[20], "/d19/f.txt 1 bytes");
    assert!(!out.contains("skipped"));
}

#[test]
fn ls_reports_directories_nested_too_deep() {
    let mut service = service();
    let mut path = std::string::String::new();
    for _ in 0..LS_STACK_MAX {
        path.push_str("/n");
        service.session_mut().volume_mut().insert_dir(&path);
    }
    service
        .session_mut()
        .volume_mut()
        .insert_file(&format!("{}/f", path), b"z");
    service.session_mut().volume_mut().insert_file("/top", b"t");

    let (status, out) = run(&mut service, "SDLS");
    assert_eq!(status, CommandStatus::Failed);
    let deepest_walked = "/n".repeat(LS_STACK_MAX - 1);
    assert!(out.contains(&format!("scan on dir={}/n skipped\r\n", deepest_walked)));
    assert!(!out.contains("/f 1 bytes"));
    assert!(out.ends_with("./top 1 bytes\r\n"));
}

#[test]
fn ls_rejects_a_path_that_does_not_fit() {
    let mut service = service();
    service.session_mut().volume_mut().insert_file("/a.txt", b"abc");
    let long = "a".repeat(crate::SD_PATH_MAX);
    let (status, out) = run(&mut service, &format!("SDLS {}", long));
    assert_eq!(status, CommandStatus::Failed);
    assert!(out.ends_with(&format!("scan on dir={} failed err:6\r\n", long)));
    assert!(!out.contains("./a.txt"));
}

#[test]
fn ls_pages_through_large_directories() {
    let mut service = service();
    for idx in 0..19 {
        let name = format!("/many/f{:02}", idx);
        service.session_mut().volume_mut().insert_file(&name, &[0; 4]);
    }
    service.session_mut().volume_mut().insert_dir("/many");
    let (status, out) = run(&mut service, "SDLS many");
    assert_eq!(status, CommandStatus::Ok);
    let lines = listing_lines(&out);
    assert_eq!(lines.len(), 19);
    assert_eq!(lines[0], "/many/f00 4 bytes");
    assert_eq!(lines[18], "/many/f18 4 bytes");
}

#[test]
fn ls_of_a_missing_directory_fails() {
    let mut service = service();
    let (status, out) = run(&mut service, "SDLS /nope");
    assert_eq!(status, CommandStatus::Failed);
    assert!(out.ends_with("scan on dir=/nope failed err:5\r\n"));
}

#[test]
fn cat_prints_text_files() {
    let mut service = service();
    let body = b"hello\r\nworld, this line is long enough to need a second scratch chunk";
    service.session_mut().volume_mut().insert_file("/hello.txt", body);
    let (status, out) = run(&mut service, "SDCAT /hello.txt");
    assert_eq!(status, CommandStatus::Ok);
    let expected = format!(
        "Read file: /hello.txt, size={}\r\n{}\r\n",
        body.len(),
        std::str::from_utf8(body).unwrap()
    );
    assert_eq!(out, expected);
}

#[test]
fn cat_keeps_characters_that_straddle_a_chunk() {
    let mut service = service();
    let mut body = "x".repeat(63);
    body.push_str("\u{e9}t\u{e9}");
    service
        .session_mut()
        .volume_mut()
        .insert_file("/accent.txt", body.as_bytes());
    let (status, out) = run(&mut service, "SDCAT /accent.txt");
    assert_eq!(status, CommandStatus::Ok);
    assert_eq!(
        out,
        format!("Read file: /accent.txt, size={}\r\n{}\r\n", body.len(), body)
    );
    assert!(!out.contains('\u{FFFD}'));
}

#[test]
fn hd_prints_a_hex_dump() {
    let mut service = service();
    let bytes: Vec<u8> = (0u8..100).collect();
    service.session_mut().volume_mut().insert_file("/data.bin", &bytes);
    let (status, out) = run(&mut service, "SDHD /data.bin");
    assert_eq!(status, CommandStatus::Ok);
    let mut expected = std::string::String::from("Read file: /data.bin, size=100\r\n");
    write_hex_dump(&mut expected, 0, &bytes).unwrap();
    assert_eq!(out, expected);
}

#[test]
fn oversized_files_are_truncated_at_the_limit() {
    let mut config = test_config();
    config.dump_max_bytes = 32;
    let mut service = service_with(config, true);
    service.session_mut().volume_mut().insert_file("/big.txt", &[b'Q'; 100]);
    let (status, out) = run(&mut service, "SDCAT /big.txt");
    assert_eq!(status, CommandStatus::Ok);
    assert!(out.starts_with("Read file: /big.txt, size=100 is too big shall not exceed 32\r\n"));
    assert_eq!(out.matches('Q').count(), 32);
}

#[test]
fn missing_file_reports_the_filesystem_code() {
    let mut service = service();
    let (status, out) = run(&mut service, "SDCAT /nope.txt");
    assert_eq!(status, CommandStatus::Failed);
    assert_eq!(out, "Error to open file /nope.txt, err:4\r\n");
}

#[test]
fn captures_are_readable_through_the_shell() {
    let mut service = service();
    let name = block_on(service.write_capture(b"captured")).unwrap();
    assert_eq!(name.as_str(), "session_000.txt");
    assert_eq!(service.last_capture_name(), Some("session_000.txt"));
    assert_eq!(service.session().mount_state(), MountState::Unmounted);

    let (status, out) = run(&mut service, "SDCAT /session_000.txt");
    assert_eq!(status, CommandStatus::Ok);
    assert!(out.contains("captured"));

    let name = block_on(service.write_capture(b"again")).unwrap();
    assert_eq!(name.as_str(), "session_001.txt");
}

#[test]
fn campaigns_run_from_the_shell() {
    let mut service = service();
    let (status, out) = run(&mut service, "SDTEST");
    assert_eq!(status, CommandStatus::Ok);
    assert!(out.ends_with("All tests passed successfully.\r\n"));

    let mut declined = service_with(test_config(), false);
    let (status, _) = run(&mut declined, "SDERASE");
    assert_eq!(status, CommandStatus::Failed);
    assert_eq!(declined.session().card().connects, 0);
}

#[test]
fn bench_and_unknown_lines() {
    let mut service = service();
    let (status, out) = run(&mut service, "SDBENCH");
    assert_eq!(status, CommandStatus::Ok);
    assert!(out.contains("blocks/S"));

    let (status, out) = run(&mut service, "SDFORMAT");
    assert_eq!(status, CommandStatus::Failed);
    assert_eq!(out, "Unknown command\r\n");
}
