//! Line-oriented challenge protocol state machine.
//!
//! The server sends one ASCII command per chunk, terminated by LF. The
//! session starts unauthenticated; a solved `POW` command stores the
//! server's authdata and unlocks the identity verbs, each of which replies
//! `hex-sha1(authdata || challenge) <answer>`.

use tracing::{debug, info, warn};

use crate::config::Identity;
use crate::error::SolveError;
use crate::hash::sha1_hex;
use crate::solver::{check_difficulty, PowSolver};
use crate::transport::Transport;

/// Receive buffer size; one received chunk is one command line.
const RECV_BUF: usize = 4096;

/// Whether the session keeps reading after a command.
enum Flow {
    Continue,
    Close,
}

/// Drives one challenge session over a connected transport.
pub struct Session<T: Transport> {
    transport: T,
    identity: Identity,
    solver: PowSolver,
    authdata: String,
    authenticated: bool,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T, identity: Identity, solver: PowSolver) -> Self {
        Self {
            transport,
            identity,
            solver,
            authdata: String::new(),
            authenticated: false,
        }
    }

    /// Recover the transport, e.g. to close it after the session ends.
    pub fn into_inner(self) -> T {
        self.transport
    }

    /// Run until the server ends the session or the transport closes.
    ///
    /// Transport EOF and read/write errors close the session cleanly; only
    /// a fatal solver failure surfaces as an error.
    pub fn run(&mut self) -> Result<(), SolveError> {
        let mut buf = [0u8; RECV_BUF];
        loop {
            let received = match self.transport.read_chunk(&mut buf) {
                Ok(0) => {
                    info!("connection closed by server");
                    return Ok(());
                }
                Ok(n) => n,
                Err(err) => {
                    warn!(error = %err, "transport read failed");
                    return Ok(());
                }
            };

            let line = String::from_utf8_lossy(trim_trailing(&buf[..received]));
            info!(command = %line, "server command");

            match self.dispatch(&line)? {
                Flow::Continue => {}
                Flow::Close => return Ok(()),
            }
        }
    }

    fn dispatch(&mut self, line: &str) -> Result<Flow, SolveError> {
        let mut tokens = line.split_ascii_whitespace();
        let Some(verb) = tokens.next() else {
            debug!("empty command received");
            return Ok(Flow::Continue);
        };
        let args: Vec<&str> = tokens.collect();

        match verb {
            "HELO" => Ok(self.reply("EHLO\n")),
            "POW" => self.handle_pow(&args),
            "END" => {
                self.reply("OK\n");
                Ok(Flow::Close)
            }
            "ERROR" => {
                warn!(detail = %args.join(" "), "server reported error");
                Ok(Flow::Close)
            }
            verb if self.identity.answer(verb).is_some() => {
                Ok(self.answer_identity(verb, args.first().copied()))
            }
            _ => Ok(self.reply("ERROR Unknown command\n")),
        }
    }

    fn handle_pow(&mut self, args: &[&str]) -> Result<Flow, SolveError> {
        let (Some(&authdata), Some(&difficulty_text)) = (args.first(), args.get(1)) else {
            return Ok(self.reply("POW_ERROR: Insufficient arguments\n"));
        };

        let difficulty = match difficulty_text.parse::<i64>() {
            Ok(d) => d,
            Err(_) => {
                warn!(value = difficulty_text, "malformed difficulty, ignoring command");
                return Ok(Flow::Continue);
            }
        };
        let difficulty = match u32::try_from(difficulty) {
            Ok(d) if check_difficulty(d).is_ok() => d,
            _ => {
                warn!(difficulty, "difficulty outside supported range");
                return Ok(self.reply("POW_ERROR: Invalid difficulty\n"));
            }
        };

        info!(authdata, difficulty, "solving proof-of-work challenge");
        match self.solver.solve(authdata.as_bytes(), difficulty) {
            Ok(nonce) => {
                self.authdata = authdata.to_owned();
                self.authenticated = true;
                Ok(self.reply(&format!("{nonce}\n")))
            }
            Err(SolveError::InvalidDifficulty(d)) => {
                warn!(difficulty = d, "solver rejected difficulty");
                Ok(self.reply("POW_ERROR: Invalid difficulty\n"))
            }
            Err(err) => Err(err),
        }
    }

    /// Identity verbs share one shape: gated on authentication, tagged
    /// with the hash of `authdata || challenge`.
    fn answer_identity(&mut self, verb: &str, challenge: Option<&str>) -> Flow {
        let challenge = match challenge {
            Some(c) if self.authenticated => c,
            _ => return self.reply(&format!("ERROR: {verb} requires authentication\n")),
        };

        let tag = sha1_hex(format!("{}{}", self.authdata, challenge).as_bytes());
        let value = self.identity.answer(verb).unwrap_or_default();
        let line = format!("{tag} {value}\n");
        self.reply(&line)
    }

    fn reply(&mut self, text: &str) -> Flow {
        debug!(reply = %text.trim_end(), "sending reply");
        match self.transport.write_all(text.as_bytes()) {
            Ok(()) => Flow::Continue,
            Err(err) => {
                warn!(error = %err, "transport write failed");
                Flow::Close
            }
        }
    }
}

/// Strip trailing CR/LF/space/tab from a received chunk.
fn trim_trailing(chunk: &[u8]) -> &[u8] {
    let end = chunk
        .iter()
        .rposition(|&b| !matches!(b, b'\r' | b'\n' | b' ' | b'\t'))
        .map_or(0, |pos| pos + 1);
    &chunk[..end]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::{leading_zero_nibbles, sha1_bytes};
    use crate::solver::PowSolverBuilder;
    use std::collections::VecDeque;
    use std::io;

    /// In-memory transport fed a fixed script of incoming chunks.
    struct ScriptedTransport {
        incoming: VecDeque<Vec<u8>>,
        sent: Vec<u8>,
    }

    impl ScriptedTransport {
        fn new(script: &[&str]) -> Self {
            Self {
                incoming: script.iter().map(|s| s.as_bytes().to_vec()).collect(),
                sent: Vec::new(),
            }
        }
    }

    impl Transport for ScriptedTransport {
        fn read_chunk(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match self.incoming.pop_front() {
                Some(chunk) => {
                    buf[..chunk.len()].copy_from_slice(&chunk);
                    Ok(chunk.len())
                }
                None => Ok(0),
            }
        }

        fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
            self.sent.extend_from_slice(bytes);
            Ok(())
        }
    }

    fn run_script(script: &[&str]) -> Vec<String> {
        let transport = ScriptedTransport::new(script);
        let solver = PowSolverBuilder::default()
            .workers(2)
            .build_validated()
            .expect("build solver");
        let mut session = Session::new(transport, Identity::default(), solver);
        session.run().expect("session");
        let sent = session.into_inner().sent;
        String::from_utf8(sent)
            .expect("replies are ascii")
            .lines()
            .map(str::to_owned)
            .collect()
    }

    #[test]
    fn helo_gets_ehlo() {
        assert_eq!(run_script(&["HELO\n"]), ["EHLO"]);
    }

    #[test]
    fn trailing_whitespace_is_stripped() {
        assert_eq!(run_script(&["HELO \t\r\n"]), ["EHLO"]);
    }

    #[test]
    fn identity_verb_before_pow_is_rejected() {
        assert_eq!(
            run_script(&["NAME xyz\n"]),
            ["ERROR: NAME requires authentication"]
        );
    }

    #[test]
    fn identity_verb_without_challenge_is_rejected() {
        assert_eq!(
            run_script(&["POW T 0\n", "COUNTRY\n"]),
            ["0", "ERROR: COUNTRY requires authentication"]
        );
    }

    #[test]
    fn pow_then_name_tags_reply_with_challenge_hash() {
        let replies = run_script(&["POW T 1\n", "NAME Q\n", "END\n"]);
        assert_eq!(replies.len(), 3);

        let nonce = &replies[0];
        let mut input = b"T".to_vec();
        input.extend_from_slice(nonce.as_bytes());
        assert!(leading_zero_nibbles(&sha1_bytes(&input), 1));

        let expected = format!("{} Deepak Shivanandham", sha1_hex(b"TQ"));
        assert_eq!(replies[1], expected);
        assert_eq!(replies[2], "OK");
    }

    #[test]
    fn repeated_identity_replies_are_identical() {
        let replies = run_script(&["POW T 0\n", "MAIL1 c1\n", "MAIL1 c1\n"]);
        assert_eq!(replies[1], replies[2]);
        assert_eq!(
            replies[1],
            format!("{} deepakshivanandham@hotmail.com", sha1_hex(b"Tc1"))
        );
    }

    #[test]
    fn zero_difficulty_pow_replies_zero() {
        assert_eq!(run_script(&["POW abc 0\n"]), ["0"]);
    }

    #[test]
    fn pow_with_one_token_is_insufficient() {
        assert_eq!(
            run_script(&["POW abc\n", "NAME x\n"]),
            [
                "POW_ERROR: Insufficient arguments",
                "ERROR: NAME requires authentication"
            ]
        );
    }

    #[test]
    fn pow_rejects_difficulty_over_forty() {
        assert_eq!(run_script(&["POW abc 41\n"]), ["POW_ERROR: Invalid difficulty"]);
    }

    #[test]
    fn pow_rejects_negative_difficulty() {
        assert_eq!(run_script(&["POW abc -1\n"]), ["POW_ERROR: Invalid difficulty"]);
    }

    #[test]
    fn malformed_difficulty_gets_no_reply() {
        assert_eq!(run_script(&["POW abc xyz\n", "END\n"]), ["OK"]);
    }

    #[test]
    fn unknown_verb_is_reported() {
        assert_eq!(run_script(&["FOO bar\n"]), ["ERROR Unknown command"]);
    }

    #[test]
    fn empty_line_is_ignored() {
        assert_eq!(run_script(&["\n", "HELO\n"]), ["EHLO"]);
    }

    #[test]
    fn server_error_closes_without_reply() {
        assert_eq!(run_script(&["ERROR out of time\n", "HELO\n"]), [""; 0]);
    }

    #[test]
    fn end_replies_ok_and_closes() {
        assert_eq!(run_script(&["END\n", "HELO\n"]), ["OK"]);
    }

    #[test]
    fn all_identity_verbs_answer_after_auth() {
        let replies = run_script(&[
            "POW auth 0\n",
            "MAILNUM c\n",
            "SKYPE c\n",
            "BIRTHDATE c\n",
            "COUNTRY c\n",
            "ADDRNUM c\n",
            "ADDRLINE1 c\n",
            "ADDRLINE2 c\n",
        ]);
        let tag = sha1_hex(b"authc");
        assert_eq!(
            replies[1..],
            [
                format!("{tag} 1"),
                format!("{tag} NA"),
                format!("{tag} 06.02.1991"),
                format!("{tag} india"),
                format!("{tag} 2"),
                format!("{tag} 25, GAJALAKSHMI NAGAR 1st CROSS STREET"),
                format!("{tag} CHROMPET,CHENNAI, TAMILNADU"),
            ]
        );
    }
}
