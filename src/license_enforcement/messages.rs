//! Operator-facing messages printed alongside the structured logs.

pub(crate) const LICENSE_EXPIRED_CTA: &str = "\
╔══════════════════════════════════════════════════════════════════════════════════╗
║ LICENSE EXPIRED                                                                  ║
║                                                                                  ║
║ The license for this application has expired. A Warning event with reason        ║
║ Expired has been recorded against this pod.                                      ║
║                                                                                  ║
║ Contact your software vendor to renew the license, then update it in the         ║
║ Replicated SDK. The next check will pick up the renewed expiration date.         ║
╚══════════════════════════════════════════════════════════════════════════════════╝";
