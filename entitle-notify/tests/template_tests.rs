use entitle_notify::{TemplateVars, render, sn_issued_message};

fn vars() -> TemplateVars {
    TemplateVars {
        product_name: "Analyst".to_string(),
        email: "a@b.com".to_string(),
        sn: "ABCD-EFGH-IJKL-MNOP".to_string(),
    }
}

#[test]
fn render_replaces_every_occurrence() {
    let out = render("{{.ProductName}} / {{.ProductName}} / {{.Email}} / {{.SN}}", &vars());
    assert_eq!(out, "Analyst / Analyst / a@b.com / ABCD-EFGH-IJKL-MNOP");
}

#[test]
fn render_leaves_other_braces_alone() {
    let html = "<style>p{color:red}</style>{{.Unknown}} {{ .SN }}";
    assert_eq!(render(html, &vars()), html);
}

#[test]
fn render_with_empty_values() {
    let out = render("SN: [{{.SN}}]", &TemplateVars::default());
    assert_eq!(out, "SN: []");
}

#[test]
fn sn_notice_mentions_sn_and_validity() {
    let (subject, body) = sn_issued_message("Analyst", "ABCD-EFGH-IJKL-MNOP", 30);
    assert!(subject.contains("Analyst"));
    assert!(body.contains("ABCD-EFGH-IJKL-MNOP"));
    assert!(body.contains("30 days"));

    let (_, forever) = sn_issued_message("Analyst", "X", 36500);
    assert!(forever.contains("does not expire"));
}
