//! Walkthrough of the pipeline pieces without an HTTP server: config
//! validation, signature verification, sealing and opening a message, and
//! parsing the inner envelope.
//!
//! Running:
//! ```bash
//! cargo run --example callback_verify
//! ```

use wecom_callback::{seal_reply, ChannelCipher, ChannelConfig, Envelope};

fn main() -> anyhow::Result<()> {
    let key = wecom_callback::keygen::generate_encoding_aes_key();
    let token = wecom_callback::keygen::generate_token(32);
    let tenant = "ww52demo000000000000";

    println!("=== 1. Config validation ===");
    let config = ChannelConfig::new(token.clone(), key.clone(), tenant.to_string())?;
    println!("config accepted for tenant {}", config.tenant_id);
    match ChannelConfig::new("has spaces!".into(), key.clone(), tenant.into()) {
        Ok(_) => println!("unexpected: bad token accepted"),
        Err(e) => println!("bad token rejected: {e}"),
    }

    println!("\n=== 2. Signature ===");
    let sig = wecom_callback::signature::compute_signature(&token, "1234567890", "nonce1", "payload");
    println!("computed: {sig}");
    println!(
        "verifies: {}",
        wecom_callback::signature::verify(&token, "1234567890", "nonce1", "payload", &sig)
    );

    println!("\n=== 3. Seal and open ===");
    let cipher = ChannelCipher::new(&key)?;
    let inner = "<xml><MsgType><![CDATA[text]]></MsgType><Content><![CDATA[hello]]></Content></xml>";
    let sealed = cipher.seal(inner, tenant)?;
    println!("ciphertext (b64, {} chars)", sealed.len());
    let opened = cipher.open(&sealed)?;
    println!("receiver id: {}", opened.receiver_id);

    println!("\n=== 4. Envelope ===");
    let envelope = Envelope::parse(&opened.plaintext).expect("inner envelope");
    println!("msg_type={:?} content={:?}", envelope.msg_type, envelope.content);

    println!("\n=== 5. Encrypted reply ===");
    let reply = seal_reply(&cipher, &token, tenant, inner, "1234567890", "nonce2")?;
    println!("{reply}");

    Ok(())
}
