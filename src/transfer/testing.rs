//! Stand-in copy tools for tests
//!
//! Scripts are run through `/bin/sh` as the tool wrapper rather than executed
//! directly, which avoids ETXTBSY when another test thread forks while a
//! freshly written script is still open.

use super::CopyTool;
use std::path::{Path, PathBuf};

/// Takes the last two non-flag arguments as SRC and DST, copies, and prints
/// progress lines the way `--info=progress2` does.
const FAKE_RSYNC: &str = r#"
src=""
dst=""
for arg in "$@"; do
  case "$arg" in
    -*) ;;
    *) src="$dst"; dst="$arg" ;;
  esac
done
mkdir -p "$(dirname "$dst")" || exit 11
cp "$src" "$dst" || exit 23
size=$(wc -c < "$src" | tr -d ' ')
half=$((size / 2))
printf '%12s  50%%    1.00MB/s    0:00:01\r' "$half"
printf '%12s 100%%    2.00MB/s    0:00:00 (xfr#1, to-chk=0/1)\n' "$size"
"#;

const FAILING_RSYNC: &str = r#"
echo 'rsync: [sender] change_dir "/src" failed: Permission denied (13)' >&2
exit 23
"#;

const HANGING_RSYNC: &str = "exec sleep 30\n";

/// Prepended to the fake tool: subtitle copies (no progress flag) hang
const HANG_WITHOUT_PROGRESS: &str = r#"
case " $* " in
  *" --info=progress2 "*) ;;
  *) exec sleep 30 ;;
esac
"#;

fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, body).unwrap();
    path
}

fn tool(dir: &Path, name: &str, body: &str) -> CopyTool {
    CopyTool::new()
        .with_wrapper(vec!["/bin/sh".to_string()])
        .with_program(script(dir, name, body))
}

pub fn fake_tool(dir: &Path) -> CopyTool {
    tool(dir, "fake-rsync.sh", FAKE_RSYNC)
}

pub fn failing_tool(dir: &Path) -> CopyTool {
    tool(dir, "failing-rsync.sh", FAILING_RSYNC)
}

pub fn hanging_tool(dir: &Path) -> CopyTool {
    tool(dir, "hanging-rsync.sh", HANGING_RSYNC)
}

pub fn subtitle_hanging_tool(dir: &Path) -> CopyTool {
    tool(
        dir,
        "subtitle-hanging-rsync.sh",
        &format!("{HANG_WITHOUT_PROGRESS}{FAKE_RSYNC}"),
    )
}
