use llmserve_core::PromptTemplate;

#[test]
fn plain_template_is_verbatim() {
    assert_eq!(PromptTemplate::default(), PromptTemplate::Plain);
    assert_eq!(PromptTemplate::Plain.render("hi there"), "hi there");
}

#[test]
fn gemma_template_wraps_a_single_user_turn() {
    assert_eq!(
        PromptTemplate::Gemma.render("hi"),
        "<start_of_turn>user\nhi<end_of_turn>\n<start_of_turn>model\n"
    );
}

#[test]
fn chatml_and_llama3_open_an_assistant_turn() {
    assert!(
        PromptTemplate::ChatMl
            .render("hi")
            .ends_with("<|im_start|>assistant\n")
    );
    assert!(
        PromptTemplate::Llama3
            .render("hi")
            .ends_with("<|start_header_id|>assistant<|end_header_id|>\n\n")
    );
}

#[test]
fn templates_parse_by_name() {
    assert_eq!("gemma".parse::<PromptTemplate>().unwrap(), PromptTemplate::Gemma);
    assert_eq!("ChatML".parse::<PromptTemplate>().unwrap(), PromptTemplate::ChatMl);
    assert_eq!("raw".parse::<PromptTemplate>().unwrap(), PromptTemplate::Plain);
    assert!("alpaca".parse::<PromptTemplate>().is_err());

    for template in [
        PromptTemplate::Plain,
        PromptTemplate::Gemma,
        PromptTemplate::ChatMl,
        PromptTemplate::Llama3,
    ] {
        assert_eq!(template.to_string().parse::<PromptTemplate>().unwrap(), template);
    }
}
