//  ██████╗  █████╗ ███████╗███████╗██╗███╗   ██╗ ██████╗
//  ██╔══██╗██╔══██╗██╔════╝██╔════╝██║████╗  ██║██╔════╝
//  ██████╔╝███████║███████╗███████╗██║██╔██╗ ██║██║  ███╗
//  ██╔═══╝ ██╔══██║╚════██║╚════██║██║██║╚██╗██║██║   ██║
//  ██║     ██║  ██║███████║███████║██║██║ ╚████║╚██████╔╝
//  ╚═╝     ╚═╝  ╚═╝╚══════╝╚══════╝╚═╝╚═╝  ╚═══╝ ╚═════╝

use assert_cmd::Command;

/// 不受外部环境变量影响的命令
fn htmlscrub() -> Command {
    let mut cmd = Command::cargo_bin("htmlscrub").unwrap();
    cmd.env_remove("HTMLSCRUB_BACKEND")
        .env_remove("HTMLSCRUB_POLICY_DIR")
        .env_remove("HTMLSCRUB_MAX_CONTENT_SIZE")
        .env_remove("HTMLSCRUB_LOG_LEVEL")
        .env("NO_COLOR", "1");
    cmd
}

#[cfg(test)]
mod passing {
    use super::htmlscrub;

    #[test]
    fn sanitizes_stdin() {
        htmlscrub()
            .write_stdin("<p onclick=\"steal()\">hi</p><script>alert(1)</script>")
            .assert()
            .success()
            .stdout("<p>hi</p>\n");
    }

    #[test]
    fn backend_from_flag_and_environment() {
        htmlscrub()
            .args(["--backend", "streaming"])
            .write_stdin("<b>x</b>")
            .assert()
            .success()
            .stdout("<b>x</b>\n");

        htmlscrub()
            .env("HTMLSCRUB_BACKEND", "streaming")
            .write_stdin("<i>y</i>")
            .assert()
            .success()
            .stdout("<i>y</i>\n");
    }

    #[test]
    fn plain_text_mode() {
        htmlscrub()
            .args(["-t", "-q"])
            .write_stdin("hello <you>\n> quoted")
            .assert()
            .success()
            .stdout("hello &lt;you&gt;<blockquote type=\"cite\">quoted</blockquote>\n");
    }

    #[test]
    fn format_urls_only() {
        let output = htmlscrub()
            .arg("--format-urls")
            .write_stdin("see https://example.com")
            .output()
            .unwrap();
        assert!(output.status.success());
        let stdout = String::from_utf8(output.stdout).unwrap();
        assert!(stdout.starts_with("see <a href=\"https://example.com\""));
    }

    #[test]
    fn css_prefix_and_strict_policy() {
        htmlscrub()
            .args(["--css-prefix", "msg"])
            .write_stdin("<p class=\"a\">x</p>")
            .assert()
            .success()
            .stdout("<p class=\"msg-a\">x</p>\n");

        htmlscrub()
            .args(["--policy", "strict"])
            .write_stdin("<p style=\"color: red\">x</p>")
            .assert()
            .success()
            .stdout("<p>x</p>\n");
    }

    #[test]
    fn env_docs() {
        let output = htmlscrub().arg("--env-docs").output().unwrap();
        assert!(output.status.success());
        let stdout = String::from_utf8(output.stdout).unwrap();
        assert!(stdout.contains("HTMLSCRUB_POLICY_DIR"));
        assert!(stdout.contains("HTMLSCRUB_BACKEND"));
    }

    #[test]
    fn print_config() {
        let output = htmlscrub()
            .arg("--print-config")
            .env("HTMLSCRUB_MAX_CONTENT_SIZE", "2048")
            .output()
            .unwrap();
        assert!(output.status.success());
        let stdout = String::from_utf8(output.stdout).unwrap();
        assert!(stdout.contains("Backend: dom"));
        assert!(stdout.contains("2048 bytes"));
    }
}

//  ███████╗ █████╗ ██╗██╗     ██╗███╗   ██╗ ██████╗
//  ██╔════╝██╔══██╗██║██║     ██║████╗  ██║██╔════╝
//  █████╗  ███████║██║██║     ██║██╔██╗ ██║██║  ███╗
//  ██╔══╝  ██╔══██║██║██║     ██║██║╚██╗██║██║   ██║
//  ██║     ██║  ██║██║███████╗██║██║ ╚████║╚██████╔╝
//  ╚═╝     ╚═╝  ╚═╝╚═╝╚══════╝╚═╝╚═╝  ╚═══╝ ╚═════╝

#[cfg(test)]
mod failing {
    use super::htmlscrub;

    fn stderr_of(cmd: &mut assert_cmd::Command) -> String {
        let output = cmd.output().unwrap();
        assert!(!output.status.success());
        String::from_utf8(output.stderr).unwrap()
    }

    #[test]
    fn unknown_policy() {
        let stderr = stderr_of(htmlscrub().args(["--policy", "nope"]).write_stdin("<p>x</p>"));
        assert!(stderr.contains("HTM-0002"), "{}", stderr);
    }

    #[test]
    fn malformed_markup() {
        let stderr = stderr_of(
            htmlscrub().write_stdin("<% hej <input onfocus=\"alert(1)//%><script>x</script>\">"),
        );
        assert!(stderr.contains("HTM-0001"), "{}", stderr);
    }

    #[test]
    fn invalid_environment_variable() {
        let stderr = stderr_of(htmlscrub().env("HTMLSCRUB_BACKEND", "regex").write_stdin("x"));
        assert!(stderr.contains("HTMLSCRUB_BACKEND"), "{}", stderr);
    }

    #[test]
    fn missing_input_file() {
        let stderr = stderr_of(htmlscrub().arg("/nonexistent/input.html"));
        assert!(!stderr.is_empty());
    }
}
