#[cfg(test)]
mod tests {
    use ferry::error::TransferError;
    use ferry::progress::{NullProgress, ProgressSink};
    use ferry::scanner::{FileEntry, SendItem};
    use ferry::transfer::protocol::DEFAULT_CHUNK_SIZE;
    use ferry::transfer::{Frame, Received, Receiver, ReceiverConfig, Sender, SenderConfig};
    use md5::{Digest, Md5};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    /// Records every engine notification, to assert ordering.
    #[derive(Debug, Default)]
    struct Recorder {
        headers: Vec<(String, String, u64)>,
        progress: Vec<u64>,
    }

    impl ProgressSink for Recorder {
        fn on_header(&mut self, rel_dir: &str, name: &str, size: u64) {
            self.headers.push((rel_dir.to_owned(), name.to_owned(), size));
        }

        fn on_progress(&mut self, bytes: u64) {
            self.progress.push(bytes);
        }
    }

    /// Send the given (path, base) pairs followed by `Done`, into a byte
    /// buffer standing in for the socket.
    async fn send_to_wire(items: &[SendItem]) -> anyhow::Result<Vec<u8>> {
        let mut wire = Vec::new();
        let mut sender = Sender::new(&mut wire, SenderConfig::default());
        for item in items {
            let entry = FileEntry::stat(item).await?;
            sender.send_file(&entry, &mut NullProgress).await?;
        }
        sender.finish().await?;
        Ok(wire)
    }

    /// Drain a wire buffer into `root`, collecting one outcome per frame.
    async fn receive_all(
        wire: &[u8],
        root: &Path,
    ) -> Vec<Result<Received, TransferError>> {
        let mut receiver = Receiver::new(wire, ReceiverConfig::new(root));
        let mut outcomes = Vec::new();
        loop {
            match receiver.recv(&mut NullProgress).await {
                Ok(Received::Done) => break,
                Ok(received) => outcomes.push(Ok(received)),
                Err(err) if !err.is_fatal() => outcomes.push(Err(err)),
                Err(err) => {
                    outcomes.push(Err(err));
                    break;
                }
            }
        }
        outcomes
    }

    fn item(path: impl Into<std::path::PathBuf>, base: &Path) -> SendItem {
        SendItem {
            path: path.into(),
            base: base.to_path_buf(),
        }
    }

    #[tokio::test]
    async fn single_file_round_trip() -> anyhow::Result<()> {
        let src = TempDir::new()?;
        let dest = TempDir::new()?;
        fs::write(src.path().join("notes.txt"), "hello12345")?;

        let wire = send_to_wire(&[item(src.path().join("notes.txt"), src.path())]).await?;
        let outcomes = receive_all(&wire, dest.path()).await;

        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].is_ok());
        assert_eq!(fs::read(dest.path().join("notes.txt"))?, b"hello12345");
        Ok(())
    }

    #[tokio::test]
    async fn nested_directory_is_recreated() -> anyhow::Result<()> {
        let src = TempDir::new()?;
        let dest = TempDir::new()?;
        fs::create_dir(src.path().join("docs"))?;
        fs::write(src.path().join("docs/readme.md"), "# readme")?;

        let wire = send_to_wire(&[item(src.path().join("docs/readme.md"), src.path())]).await?;
        let outcomes = receive_all(&wire, dest.path()).await;

        assert_eq!(outcomes.len(), 1);
        assert_eq!(
            outcomes[0].as_ref().unwrap(),
            &Received::File {
                name: "readme.md".to_string(),
                rel_dir: "docs".to_string(),
            }
        );
        assert!(dest.path().join("docs").is_dir());
        assert_eq!(
            fs::read_to_string(dest.path().join("docs/readme.md"))?,
            "# readme"
        );
        Ok(())
    }

    #[tokio::test]
    async fn round_trip_across_chunk_boundaries() -> anyhow::Result<()> {
        let src = TempDir::new()?;
        let dest = TempDir::new()?;

        // Empty, one below, exactly one, and a few chunks plus a remainder.
        let sizes = [0usize, DEFAULT_CHUNK_SIZE - 1, DEFAULT_CHUNK_SIZE, 3 * DEFAULT_CHUNK_SIZE + 7];
        let mut items = Vec::new();
        for (i, size) in sizes.iter().enumerate() {
            let content: Vec<u8> = (0..*size).map(|b| ((b * 31 + i * 7) % 251) as u8).collect();
            let path = src.path().join(format!("blob{i}.bin"));
            fs::write(&path, &content)?;
            items.push(item(path, src.path()));
        }

        let wire = send_to_wire(&items).await?;
        let outcomes = receive_all(&wire, dest.path()).await;

        assert_eq!(outcomes.len(), sizes.len());
        assert!(outcomes.iter().all(|o| o.is_ok()));
        for (i, size) in sizes.iter().enumerate() {
            let received = fs::read(dest.path().join(format!("blob{i}.bin")))?;
            assert_eq!(received.len(), *size);
            let expected = fs::read(src.path().join(format!("blob{i}.bin")))?;
            assert_eq!(received, expected);
        }
        Ok(())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn executable_bit_is_preserved() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let src = TempDir::new()?;
        let dest = TempDir::new()?;
        let script = src.path().join("run.sh");
        fs::write(&script, "#!/bin/sh\nexit 0\n")?;
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755))?;

        let wire = send_to_wire(&[item(script, src.path())]).await?;
        let outcomes = receive_all(&wire, dest.path()).await;
        assert!(outcomes[0].is_ok());

        let mode = fs::metadata(dest.path().join("run.sh"))?.permissions().mode();
        assert_eq!(mode & 0o111, 0o111);
        Ok(())
    }

    #[tokio::test]
    async fn corrupted_body_reports_mismatch_and_session_continues() -> anyhow::Result<()> {
        let src = TempDir::new()?;
        let dest = TempDir::new()?;
        fs::write(src.path().join("first.txt"), "first file body")?;
        fs::write(src.path().join("second.txt"), "second file body")?;

        let mut wire = send_to_wire(&[
            item(src.path().join("first.txt"), src.path()),
            item(src.path().join("second.txt"), src.path()),
        ])
        .await?;

        // Flip one body byte of the first file. Header: opcode, name line,
        // 8 size bytes, empty rel-dir line, exec flag.
        let header_len = 1 + "first.txt\n".len() + 8 + 1 + 1;
        wire[header_len] ^= 0xFF;

        let outcomes = receive_all(&wire, dest.path()).await;
        assert_eq!(outcomes.len(), 2);
        assert!(matches!(
            outcomes[0],
            Err(TransferError::IntegrityMismatch { .. })
        ));
        assert!(outcomes[1].is_ok());

        // The corrupted file was still written in full.
        let written = fs::read(dest.path().join("first.txt"))?;
        assert_eq!(written.len(), "first file body".len());
        assert_ne!(written, b"first file body");
        assert_eq!(fs::read(dest.path().join("second.txt"))?, b"second file body");
        Ok(())
    }

    #[tokio::test]
    async fn traversal_is_rejected_before_any_mutation() -> anyhow::Result<()> {
        for rel_dir in ["../escape", "/x", "x/"] {
            let dest = TempDir::new()?;
            let mut wire = vec![Frame::FileWithPath {
                name: "evil.txt".to_string(),
                size: 4,
                rel_dir: rel_dir.to_string(),
                executable: false,
            }
            .opcode() as u8];
            wire.extend_from_slice(
                &Frame::FileWithPath {
                    name: "evil.txt".to_string(),
                    size: 4,
                    rel_dir: rel_dir.to_string(),
                    executable: false,
                }
                .encode_fields()?,
            );

            let mut receiver = Receiver::new(&wire[..], ReceiverConfig::new(dest.path()));
            let err = receiver.recv(&mut NullProgress).await.unwrap_err();
            assert!(
                matches!(err, TransferError::UnsafePath(_)),
                "{rel_dir} should be rejected"
            );
            assert!(
                fs::read_dir(dest.path())?.next().is_none(),
                "{rel_dir} must not create anything"
            );
        }
        Ok(())
    }

    #[tokio::test]
    async fn legacy_frames_land_in_the_flat_root() -> anyhow::Result<()> {
        let dest = TempDir::new()?;
        let body = b"legacy body bytes";
        let digest = hex::encode(Md5::digest(body));

        // Md5WithFile carries the digest before the body.
        let mut wire = vec![3u8];
        wire.extend_from_slice(b"leading.txt\n");
        wire.extend_from_slice(&(body.len() as u64).to_le_bytes());
        wire.extend_from_slice(digest.as_bytes());
        wire.push(b'\n');
        wire.extend_from_slice(body);

        // FileWithMd5 carries it after.
        wire.push(4u8);
        wire.extend_from_slice(b"trailing.txt\n");
        wire.extend_from_slice(&(body.len() as u64).to_le_bytes());
        wire.extend_from_slice(body);
        wire.extend_from_slice(digest.as_bytes());
        wire.push(b'\n');

        wire.push(2u8);

        let outcomes = receive_all(&wire, dest.path()).await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.iter().all(|o| o.is_ok()));
        assert_eq!(fs::read(dest.path().join("leading.txt"))?, body.to_vec());
        assert_eq!(fs::read(dest.path().join("trailing.txt"))?, body.to_vec());
        Ok(())
    }

    #[tokio::test]
    async fn legacy_frame_with_bad_digest_is_a_mismatch() -> anyhow::Result<()> {
        let dest = TempDir::new()?;
        let body = b"some content";

        let mut wire = vec![3u8];
        wire.extend_from_slice(b"bad.txt\n");
        wire.extend_from_slice(&(body.len() as u64).to_le_bytes());
        wire.extend_from_slice("0".repeat(32).as_bytes());
        wire.push(b'\n');
        wire.extend_from_slice(body);

        let mut receiver = Receiver::new(&wire[..], ReceiverConfig::new(dest.path()));
        let err = receiver.recv(&mut NullProgress).await.unwrap_err();
        assert!(!err.is_fatal());
        assert!(matches!(err, TransferError::IntegrityMismatch { .. }));
        assert_eq!(fs::read(dest.path().join("bad.txt"))?, body.to_vec());
        Ok(())
    }

    #[tokio::test]
    async fn peer_name_contributes_only_its_final_component() -> anyhow::Result<()> {
        let dest = TempDir::new()?;
        let body = b"x";
        let mut wire = vec![1u8];
        wire.extend_from_slice(b"deep/inside/flat.txt\n");
        wire.extend_from_slice(&(body.len() as u64).to_le_bytes());
        wire.extend_from_slice(body);

        let mut receiver = Receiver::new(&wire[..], ReceiverConfig::new(dest.path()));
        let received = receiver.recv(&mut NullProgress).await?;
        assert_eq!(
            received,
            Received::File {
                name: "flat.txt".to_string(),
                rel_dir: String::new(),
            }
        );
        assert!(dest.path().join("flat.txt").is_file());
        assert!(!dest.path().join("deep").exists());
        Ok(())
    }

    #[tokio::test]
    async fn header_fires_before_any_body_bytes() -> anyhow::Result<()> {
        let src = TempDir::new()?;
        let dest = TempDir::new()?;
        fs::create_dir(src.path().join("docs"))?;
        let content = vec![7u8; DEFAULT_CHUNK_SIZE + 100];
        fs::write(src.path().join("docs/guide.md"), &content)?;

        let wire = send_to_wire(&[item(src.path().join("docs/guide.md"), src.path())]).await?;

        let mut recorder = Recorder::default();
        let mut receiver = Receiver::new(&wire[..], ReceiverConfig::new(dest.path()));
        receiver.recv(&mut recorder).await?;

        assert_eq!(
            recorder.headers,
            vec![(
                "docs".to_string(),
                "guide.md".to_string(),
                content.len() as u64
            )]
        );
        // Two chunks, cumulative counts, ending at the full size.
        assert_eq!(recorder.progress.len(), 2);
        assert_eq!(recorder.progress.last(), Some(&(content.len() as u64)));
        Ok(())
    }

    #[tokio::test]
    async fn sender_rejects_a_name_with_an_embedded_newline() -> anyhow::Result<()> {
        let src = TempDir::new()?;
        let path = src.path().join("bad\nname");
        fs::write(&path, "x")?;

        let mut wire = Vec::new();
        let mut sender = Sender::new(&mut wire, SenderConfig::default());
        let entry = FileEntry::stat(&item(path, src.path())).await?;
        let err = sender
            .send_file(&entry, &mut NullProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Frame(_)));
        Ok(())
    }
}
