//! Fake get_iplayer tool and programme API payloads

use std::path::{Path, PathBuf};

/// Episode that downloads video and audio, then post-processes
pub const FULL_EPISODE: &str = "b0000001";
/// Episode whose tool run fails with exit code 1
pub const FAILING_EPISODE: &str = "b0000002";
/// Episode whose tool exits 0 without producing media
pub const EMPTY_EPISODE: &str = "b0000003";
/// Episode whose media lands in a nested directory
pub const NESTED_EPISODE: &str = "b0000004";
/// Episode that never finishes on its own
pub const STALLED_EPISODE: &str = "b0000005";
/// Series that only the tool's own listing can expand
pub const LISTED_SERIES: &str = "s0000009";

/// A shell script standing in for get_iplayer
///
/// Accepts the real download arguments, honours `--output` and `--pid=`, and
/// behaves according to the episode constants above.
pub const FAKE_GET_IPLAYER: &str = r#"#!/bin/sh
out=""
pid=""
list=""
while [ $# -gt 0 ]; do
  case "$1" in
    --output) out="$2"; shift ;;
    --pid=*) pid="${1#--pid=}" ;;
    --pid-recursive-list) list=1 ;;
  esac
  shift
done

if [ -n "$list" ]; then
  echo "INFO: Getting feed for $pid"
  if [ "$pid" = "s0000009" ]; then
    echo "Episodes:"
    echo "Show: Series 1 - 1. First, BBC One, b0000001"
    echo "INFO: Cached programme details"
    echo "Show: Series 1 - 4. Fourth, BBC One, b0000004"
  fi
  exit 0
fi
[ -n "$out" ] || { echo "ERROR: no output directory"; exit 2; }

case "$pid" in
  b0000001)
    echo "INFO: Recording: Show: Series 1 - Episode"
    printf '  10.0%% @  1.5Mb/s ETA: 00:00:20 [video]\r'
    printf '  55.5%% @  2.0Mb/s ETA: 00:00:09 [video]\r'
    printf ' 100.0%% @  2.1Mb/s ETA: 00:00:00 [video]\n'
    printf '  40.0%% @  0.2Mb/s ETA: 00:00:03 [audio]\n'
    echo "INFO: Downloaded: 12.00 MB (00:00:05) @ 2.1 Mb/s (b0000001) [video]"
    echo "INFO: Downloaded: 1.00 MB (00:00:05) @ 0.2 Mb/s (b0000001) [audio]"
    echo "INFO: Tagging MP4"
    printf 'video' > "$out/Show_-_Episode_b0000001_original.mp4"
    printf 'subs' > "$out/Show_-_Episode_b0000001_original.srt"
    ;;
  b0000002)
    echo "ERROR: Failed to get version pid metadata"
    exit 1
    ;;
  b0000003)
    echo "WARNING: No programmes are available for this pid"
    ;;
  b0000004)
    mkdir -p "$out/nested"
    printf '  70.0%% @  3.0Mb/s ETA: 00:00:01 [audio+video]\n'
    printf 'video' > "$out/nested/Nested_b0000004_original.mp4"
    ;;
  b0000005)
    sleep 10
    ;;
esac
exit 0
"#;

/// Write [`FAKE_GET_IPLAYER`] into `dir` and make it executable
#[cfg(unix)]
pub fn install_fake_tool(dir: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("get_iplayer");
    std::fs::write(&path, FAKE_GET_IPLAYER).expect("write fake get_iplayer");
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755))
        .expect("make fake get_iplayer executable");
    path
}

/// Programme JSON for an episode with brand and series ancestry
pub fn episode_json(pid: &str, title: &str, position: u32, series: u32, brand: &str) -> serde_json::Value {
    serde_json::json!({
        "programme": {
            "type": "episode",
            "pid": pid,
            "title": title,
            "position": position,
            "parent": {"programme": {
                "type": "series",
                "position": series,
                "title": format!("Series {series}"),
                "parent": {"programme": {"type": "brand", "title": brand}}
            }}
        }
    })
}
